//! Source descriptor parsing
//!
//! Turns a raw source string into a structured [`Source`]. Recognized shapes,
//! in detection order:
//!
//! - local filesystem paths (`./bundle`, `../x`, `/abs`, `~/x`, `file://...`)
//! - shorthand `owner/repo[/subdir...]` and `gh:owner/repo[/subdir...]`
//! - full git URLs with a `//`-delimited subdirectory suffix
//! - host web URLs (`tree/`, `src/`, `-/tree/` segments) normalized into a
//!   clone URL + ref + subdir
//! - plain git URLs (HTTPS, SSH, `git@...`)
//!
//! Parsing is purely syntactic: no I/O, no network. A source with a
//! subdirectory always carries a clone URL pointing at the repository root,
//! never the subpath; batch callers re-derive root sources via
//! [`Source::root_source`].

use serde::{Deserialize, Serialize};

use crate::error::{BunkerError, Result};

/// What a source string resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Local directory, installed by copy
    Local,
    /// Git repository, installed by clone
    Git,
}

/// A parsed source descriptor. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Raw string as given by the user
    pub raw: String,

    /// Kind of source (local directory vs git repository)
    pub kind: SourceKind,

    /// Clone URL at the repository root; empty for local sources
    pub clone_url: String,

    /// Subdirectory within the repository; empty means whole repo
    pub subdir: String,

    /// Default name for the installed bundle
    pub name: String,

    /// Owner segment of a host URL, when derivable
    pub host_owner: String,

    /// Repository segment of a host URL, when derivable
    pub host_repo: String,

    /// Git ref encoded in a web URL (branch, tag, or SHA)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
}

impl Source {
    /// Parse a raw source string into a structured descriptor.
    pub fn resolve(raw: &str) -> Result<Self> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(invalid(raw, "empty source string"));
        }

        if is_local_path(input) {
            return Ok(Self::local(raw, input));
        }

        if let Some(parsed) = parse_web_url(input) {
            return Ok(Self::from_parts(raw, parsed));
        }

        if let Some(parsed) = parse_url_with_subdir_marker(input) {
            return Ok(Self::from_parts(raw, parsed));
        }

        if let Some(rest) = input.strip_prefix("gh:") {
            return parse_shorthand(rest)
                .map(|parsed| Self::from_parts(raw, parsed))
                .ok_or_else(|| invalid(raw, "expected gh:owner/repo[/subdir]"));
        }

        if is_git_url(input) {
            let (owner, repo) = owner_repo_from_url(input);
            let name = repo.clone();
            return Ok(Self {
                raw: raw.to_string(),
                kind: SourceKind::Git,
                clone_url: input.to_string(),
                subdir: String::new(),
                name,
                host_owner: owner,
                host_repo: repo,
                git_ref: None,
            });
        }

        if let Some(parsed) = parse_shorthand(input) {
            return Ok(Self::from_parts(raw, parsed));
        }

        Err(invalid(raw, "matches no known source shape"))
    }

    /// A copy of this source pointing at the repository root (subdir cleared).
    ///
    /// Used by batch operations that clone once and extract many bundles.
    pub fn root_source(&self) -> Self {
        let mut root = self.clone();
        root.subdir = String::new();
        if !root.host_repo.is_empty() {
            root.name = root.host_repo.clone();
        }
        root
    }

    fn local(raw: &str, path: &str) -> Self {
        let trimmed = path
            .strip_prefix("file://")
            .unwrap_or(path)
            .trim_end_matches('/');
        let name = trimmed
            .rsplit(['/', '\\'])
            .find(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
            .unwrap_or("bundle")
            .to_string();
        Self {
            raw: raw.to_string(),
            kind: SourceKind::Local,
            clone_url: String::new(),
            subdir: String::new(),
            name,
            host_owner: String::new(),
            host_repo: String::new(),
            git_ref: None,
        }
    }

    fn from_parts(raw: &str, parts: ParsedGit) -> Self {
        let name = if parts.subdir.is_empty() {
            parts.repo.clone()
        } else {
            parts
                .subdir
                .rsplit('/')
                .next()
                .unwrap_or(&parts.repo)
                .to_string()
        };
        Self {
            raw: raw.to_string(),
            kind: SourceKind::Git,
            clone_url: parts.clone_url,
            subdir: parts.subdir,
            name,
            host_owner: parts.owner,
            host_repo: parts.repo,
            git_ref: parts.git_ref,
        }
    }
}

/// Intermediate result of git-shaped parsing
struct ParsedGit {
    clone_url: String,
    owner: String,
    repo: String,
    subdir: String,
    git_ref: Option<String>,
}

fn invalid(input: &str, reason: &str) -> BunkerError {
    BunkerError::InvalidSource {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// Syntactic local-path detection; existence is the caller's concern.
fn is_local_path(input: &str) -> bool {
    input == "."
        || input == ".."
        || input.starts_with("./")
        || input.starts_with("../")
        || input.starts_with('/')
        || input.starts_with("~/")
        || input.starts_with("file://")
        || input.starts_with(".\\")
        || input.starts_with("..\\")
}

fn is_git_url(input: &str) -> bool {
    input.starts_with("https://")
        || input.starts_with("http://")
        || input.starts_with("ssh://")
        || input.starts_with("git@")
}

/// Shorthand `owner/repo[/subdir...]`: first two segments are the GitHub
/// owner and repository, anything after is a subdirectory inside it.
fn parse_shorthand(input: &str) -> Option<ParsedGit> {
    if input.contains("://") || input.contains(':') || input.contains('@') {
        return None;
    }
    let segments: Vec<&str> = input.split('/').collect();
    if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    let owner = segments[0];
    let repo = segments[1].trim_end_matches(".git");
    if !is_plausible_segment(owner) || !is_plausible_segment(repo) {
        return None;
    }
    let subdir = segments[2..].join("/");
    Some(ParsedGit {
        clone_url: format!("https://github.com/{owner}/{repo}.git"),
        owner: owner.to_string(),
        repo: repo.to_string(),
        subdir,
        git_ref: None,
    })
}

fn is_plausible_segment(seg: &str) -> bool {
    !seg.is_empty()
        && seg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Generic git URL with an embedded `//` subdirectory marker, e.g.
/// `https://host/owner/repo.git//tools/linter`.
fn parse_url_with_subdir_marker(input: &str) -> Option<ParsedGit> {
    let scheme_end = input.find("://").map(|p| p + 3).or_else(|| {
        // SCP-style: git@host:owner/repo.git//subdir
        input.starts_with("git@").then_some(0)
    })?;
    let marker = input[scheme_end..].find("//").map(|p| p + scheme_end)?;

    let url = &input[..marker];
    let subdir = input[marker + 2..].trim_matches('/');
    if subdir.is_empty() || !is_git_url(url) {
        return None;
    }
    let (owner, repo) = owner_repo_from_url(url);
    Some(ParsedGit {
        clone_url: url.to_string(),
        owner,
        repo,
        subdir: subdir.to_string(),
        git_ref: None,
    })
}

/// Host web URLs that encode owner/repo/ref/subdir:
///
/// - GitHub:    `https://github.com/{owner}/{repo}/tree/{ref}[/{path}]`
/// - GitLab:    `https://gitlab.com/{owner}/{repo}/-/tree/{ref}[/{path}]`
/// - Bitbucket: `https://bitbucket.org/{owner}/{repo}/src/{ref}[/{path}]`
fn parse_web_url(input: &str) -> Option<ParsedGit> {
    let rest = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))?;
    let (host, path) = rest.split_once('/')?;
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() < 4 {
        return None;
    }

    let (owner, repo) = (parts[0], parts[1]);
    let git_ref_idx = match (parts[2], parts.get(3)) {
        ("-", Some(&"tree")) => 4,
        ("tree" | "src", _) => 3,
        _ => return None,
    };
    let git_ref = parts.get(git_ref_idx)?.to_string();
    let subdir = parts[git_ref_idx + 1..].join("/");

    Some(ParsedGit {
        clone_url: format!("https://{host}/{owner}/{repo}.git"),
        owner: owner.to_string(),
        repo: repo.to_string(),
        subdir,
        git_ref: Some(git_ref),
    })
}

/// Best-effort owner/repo extraction from a clone URL.
fn owner_repo_from_url(url: &str) -> (String, String) {
    let path = if let Some(pos) = url.find("://") {
        url[pos + 3..].split_once('/').map(|(_, p)| p).unwrap_or("")
    } else if let Some(rest) = url.strip_prefix("git@") {
        rest.split_once(':').map(|(_, p)| p).unwrap_or("")
    } else {
        ""
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [.., owner, repo] => (
            (*owner).to_string(),
            repo.trim_end_matches(".git").to_string(),
        ),
        [repo] => (String::new(), repo.trim_end_matches(".git").to_string()),
        _ => (String::new(), String::new()),
    }
}
