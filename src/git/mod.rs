//! Git operations for cloning and updating tracked bundles
//!
//! This module handles:
//! - Cloning repositories (HTTPS and SSH), optionally shallow
//! - Resolving refs (branches, tags) to exact SHAs
//! - Pull-based updates (fetch + hard reset) for tracked repositories
//! - Hard reset used as the audit gate's rollback primitive
//! - Authentication via git's native credential system
//!
//! Authentication is delegated entirely to git's native system:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Environment variables (GIT_SSH_COMMAND, etc.)

use std::path::Path;

use git2::{
    Cred, CredentialType, ErrorClass, FetchOptions, RemoteCallbacks, Repository, build::RepoBuilder,
};

use crate::error::{BunkerError, Result};
use crate::progress::ProgressSink;

/// Normalize SSH URLs from SCP-style (git@host:path) to ssh:// format.
///
/// libgit2 may have issues with SCP-style SSH URLs, so we convert them to
/// the explicit ssh:// format for better compatibility.
fn normalize_ssh_url_for_clone(url: &str) -> std::borrow::Cow<'_, str> {
    if !url.starts_with("git@") || url.starts_with("ssh://") {
        return std::borrow::Cow::Borrowed(url);
    }

    if let Some(colon_pos) = url.find(':') {
        let host_part = &url[..colon_pos];
        let path_part = &url[colon_pos + 1..];
        let normalized_path = if path_part.starts_with('/') {
            path_part.to_string()
        } else {
            format!("/{}", path_part)
        };
        return std::borrow::Cow::Owned(format!("ssh://{}{}", host_part, normalized_path));
    }

    std::borrow::Cow::Borrowed(url)
}

/// Normalize file:// URLs so libgit2 can resolve them on Unix.
fn normalize_file_url_for_clone(url: &str) -> std::borrow::Cow<'_, str> {
    if !url.starts_with("file://") {
        return std::borrow::Cow::Borrowed(url);
    }
    let after = &url[7..];
    if after.contains('\\') {
        let path = after.replace('\\', "/");
        return std::borrow::Cow::Owned(format!("file:///{}", path));
    }
    if !after.is_empty() && !after.starts_with('/') {
        return std::borrow::Cow::Owned(format!("file:///{}", after));
    }
    std::borrow::Cow::Borrowed(url)
}

/// Interpret a git2 error and provide a more user-friendly message
fn interpret_git_error(err: &git2::Error) -> String {
    let class = err.class();
    let message = err.message().to_lowercase();

    // Order matters - more specific patterns first
    if message.contains("not found") || message.contains("404") {
        "Repository not found".to_string()
    } else if message.contains("too many redirects") || message.contains("authentication replays") {
        // Often means the repository doesn't exist but auth is being attempted
        "Repository not found".to_string()
    } else if message.contains("authentication") || message.contains("credentials") {
        "Authentication failed".to_string()
    } else if message.contains("permission denied") || message.contains("access denied") {
        "Permission denied".to_string()
    } else if message.contains("connection")
        || message.contains("network")
        || message.contains("timeout")
        || message.contains("timed out")
    {
        "Network error".to_string()
    } else if class == ErrorClass::Http {
        if message.contains("certificate") {
            "Certificate error".to_string()
        } else if message.contains("ssl") {
            "SSL error".to_string()
        } else {
            format!("HTTP error: {}", err.message())
        }
    } else if class == ErrorClass::Ssh {
        format!("SSH error: {}", err.message())
    } else {
        err.message().to_string()
    }
}

/// Set up authentication callbacks for git operations
///
/// This delegates authentication to git's native credential system:
/// SSH agent, keys from ~/.ssh/, credential helpers, plain usernames.
fn setup_auth_callbacks(callbacks: &mut RemoteCallbacks) {
    callbacks.credentials(|url, username_from_url, allowed_types| {
        if allowed_types.contains(CredentialType::DEFAULT) {
            return Cred::default();
        }

        if allowed_types.contains(CredentialType::SSH_KEY) {
            if let Some(username) = username_from_url {
                if let Ok(cred) = Cred::ssh_key_from_agent(username) {
                    return Ok(cred);
                }

                let home = dirs::home_dir().unwrap_or_default();
                let ssh_dir = home.join(".ssh");

                for key_name in &["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let private_key = ssh_dir.join(key_name);
                    let public_key = ssh_dir.join(format!("{}.pub", key_name));

                    if private_key.exists() {
                        let public_key_path = if public_key.exists() {
                            Some(public_key.as_path())
                        } else {
                            None
                        };

                        if let Ok(cred) =
                            Cred::ssh_key(username, public_key_path, &private_key, None)
                        {
                            return Ok(cred);
                        }
                    }
                }
            }
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Ok(config) = git2::Config::open_default() {
                if let Ok(cred) = Cred::credential_helper(&config, url, username_from_url) {
                    return Ok(cred);
                }
            }

            // For public HTTPS repos, empty credentials let the server answer
            if let Ok(cred) = Cred::userpass_plaintext("", "") {
                return Ok(cred);
            }

            if let Some(username) = username_from_url {
                if let Ok(cred) = Cred::userpass_plaintext(username, "") {
                    return Ok(cred);
                }
            }

            for username in &["git", "anonymous"] {
                if let Ok(cred) = Cred::userpass_plaintext(username, "") {
                    return Ok(cred);
                }
            }
        }

        Err(git2::Error::new(
            git2::ErrorCode::Auth,
            git2::ErrorClass::Http,
            "authentication failed",
        ))
    });
}

/// Wire the advisory progress sink into remote callbacks.
fn setup_progress_callbacks(callbacks: &mut RemoteCallbacks, progress: ProgressSink) {
    let sideband = std::sync::Arc::clone(&progress);
    callbacks.sideband_progress(move |data| {
        if let Ok(text) = std::str::from_utf8(data) {
            let line = text.trim();
            if !line.is_empty() {
                sideband(line);
            }
        }
        true
    });
    callbacks.transfer_progress(move |stats| {
        progress(&format!(
            "Receiving objects: {}/{}",
            stats.received_objects(),
            stats.total_objects()
        ));
        true
    });
}

fn fetch_options(progress: ProgressSink) -> FetchOptions<'static> {
    let mut callbacks = RemoteCallbacks::new();
    setup_auth_callbacks(&mut callbacks);
    setup_progress_callbacks(&mut callbacks, progress);

    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}

/// Clone a git repository to a target directory
///
/// Supports both HTTPS and SSH URLs. `shallow` requests a depth-1 clone for
/// remote URLs; local paths are always cloned fully.
pub fn clone(url: &str, target: &Path, shallow: bool, progress: ProgressSink) -> Result<Repository> {
    let mut options = fetch_options(progress);

    let is_local = url.starts_with("file://")
        || url.starts_with('/')
        || std::path::Path::new(url).is_absolute();
    if shallow && !is_local {
        options.depth(1);
    }

    let mut builder = RepoBuilder::new();
    builder.fetch_options(options);

    let url_to_clone = normalize_ssh_url_for_clone(url);
    let url_to_clone = normalize_file_url_for_clone(&url_to_clone);
    builder.clone(url_to_clone.as_ref(), target).map_err(|e| {
        let reason = interpret_git_error(&e);
        BunkerError::GitCloneFailed {
            url: url.to_string(),
            reason,
        }
    })
}

/// Open an existing repository
pub fn open(path: &Path) -> Result<Repository> {
    Repository::open(path).map_err(|e| BunkerError::GitOpenFailed {
        path: path.display().to_string(),
        reason: e.message().to_string(),
    })
}

/// Resolve a git ref (branch, tag, or partial SHA) to a full SHA
///
/// If no ref is provided, defaults to HEAD.
pub fn resolve_ref(repo: &Repository, git_ref: Option<&str>) -> Result<String> {
    let commit = match git_ref {
        Some(r) => resolve_reference(repo, r)?,
        None => repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| BunkerError::GitOperationFailed {
                message: format!("Failed to resolve HEAD: {}", e.message()),
            })?,
    };
    Ok(commit.id().to_string())
}

/// Resolve a reference name to a commit
fn resolve_reference<'a>(repo: &'a Repository, refname: &str) -> Result<git2::Commit<'a>> {
    let ref_candidates = [
        refname.to_string(),
        format!("refs/heads/{}", refname),
        format!("refs/tags/{}", refname),
        format!("refs/remotes/origin/{}", refname),
    ];

    for candidate in &ref_candidates {
        if let Ok(reference) = repo.find_reference(candidate) {
            if let Ok(commit) = reference.peel_to_commit() {
                return Ok(commit);
            }
        }
    }

    if let Ok(oid) = git2::Oid::from_str(refname) {
        if let Ok(commit) = repo.find_commit(oid) {
            return Ok(commit);
        }
    }

    if let Ok(obj) = repo.revparse_single(refname) {
        if let Ok(commit) = obj.peel_to_commit() {
            return Ok(commit);
        }
    }

    Err(BunkerError::GitOperationFailed {
        message: format!("Could not resolve reference '{}'", refname),
    })
}

/// Checkout a specific commit (detached HEAD, forced working tree).
pub fn checkout_commit(repo: &Repository, sha: &str) -> Result<()> {
    let oid = git2::Oid::from_str(sha).map_err(|e| BunkerError::GitOperationFailed {
        message: format!("Invalid SHA '{}': {}", sha, e.message()),
    })?;

    let commit = repo
        .find_commit(oid)
        .map_err(|e| BunkerError::GitOperationFailed {
            message: format!("Commit '{}' not found: {}", sha, e.message()),
        })?;

    repo.set_head_detached(commit.id())
        .map_err(|e| BunkerError::GitOperationFailed {
            message: format!("Failed to detach HEAD at '{}': {}", sha, e.message()),
        })?;

    let mut checkout_builder = git2::build::CheckoutBuilder::new();
    checkout_builder.force();
    repo.checkout_head(Some(&mut checkout_builder))
        .map_err(|e| BunkerError::GitOperationFailed {
            message: format!("Failed to checkout '{}': {}", sha, e.message()),
        })?;

    Ok(())
}

/// Current HEAD commit SHA of a repository working copy.
pub fn head_commit(repo_path: &Path) -> Result<String> {
    let repo = open(repo_path)?;
    resolve_ref(&repo, None)
}

/// Whether the working tree has uncommitted changes (staged or unstaged).
///
/// Untracked files count as changes: a pull may overwrite them. The install
/// metadata record lives untracked inside tracked bundles and is exempt.
pub fn has_uncommitted_changes(repo_path: &Path) -> Result<bool> {
    let repo = open(repo_path)?;
    let mut options = git2::StatusOptions::new();
    options
        .include_untracked(true)
        .exclude_submodules(true)
        .include_ignored(false);
    let statuses = repo
        .statuses(Some(&mut options))
        .map_err(|e| BunkerError::GitOperationFailed {
            message: format!("Failed to read status: {}", e.message()),
        })?;
    Ok(statuses
        .iter()
        .any(|entry| entry.path() != Some(crate::store::METADATA_FILE)))
}

/// Hard-reset a working copy to a specific commit.
///
/// This is the rollback primitive for tracked repositories: after a declined
/// or failed audit the tree is restored to the pre-pull commit.
pub fn reset_hard(repo_path: &Path, sha: &str) -> Result<()> {
    let repo = open(repo_path)?;
    let oid = git2::Oid::from_str(sha).map_err(|e| BunkerError::GitOperationFailed {
        message: format!("Invalid SHA '{}': {}", sha, e.message()),
    })?;
    let object = repo
        .find_object(oid, None)
        .map_err(|e| BunkerError::GitOperationFailed {
            message: format!("Commit '{}' not found: {}", sha, e.message()),
        })?;
    repo.reset(&object, git2::ResetType::Hard, None)
        .map_err(|e| BunkerError::GitOperationFailed {
            message: format!("Failed to reset to '{}': {}", sha, e.message()),
        })?;
    Ok(())
}

/// Fetch from origin and hard-reset the working copy to the remote head.
///
/// Returns `(before_sha, after_sha)`. Refuses to touch a dirty working tree
/// unless `force`; with `force`, local changes are discarded first.
pub fn pull(repo_path: &Path, force: bool, progress: ProgressSink) -> Result<(String, String)> {
    if has_uncommitted_changes(repo_path)? {
        if !force {
            return Err(BunkerError::UncommittedChanges {
                path: repo_path.display().to_string(),
            });
        }
        discard_local_changes(repo_path)?;
    }

    let before = head_commit(repo_path)?;

    let repo = open(repo_path)?;
    let mut remote = repo
        .find_remote("origin")
        .map_err(|e| BunkerError::GitPullFailed {
            path: repo_path.display().to_string(),
            reason: format!("no origin remote: {}", e.message()),
        })?;

    let branch = current_branch(&repo)?;
    let refspec = format!("refs/heads/{branch}:refs/remotes/origin/{branch}");
    let mut options = fetch_options(progress);
    remote
        .fetch(&[refspec.as_str()], Some(&mut options), None)
        .map_err(|e| BunkerError::GitPullFailed {
            path: repo_path.display().to_string(),
            reason: interpret_git_error(&e),
        })?;

    let after = resolve_ref(&repo, Some(&format!("refs/remotes/origin/{branch}")))?;
    drop(remote);
    drop(repo);

    if after != before {
        reset_hard(repo_path, &after)?;
    }

    Ok((before, after))
}

/// Discard every local change, untracked files included, so a forced pull
/// starts from a pristine tree. A hard reset alone leaves untracked files in
/// place, where they could collide with paths the incoming head adds.
///
/// The install metadata record lives untracked inside tracked bundles and is
/// restored after the cleanup.
fn discard_local_changes(repo_path: &Path) -> Result<()> {
    let metadata_path = repo_path.join(crate::store::METADATA_FILE);
    let saved_metadata = std::fs::read(&metadata_path).ok();

    let repo = open(repo_path)?;
    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force().remove_untracked(true);
    repo.checkout_head(Some(&mut checkout))
        .map_err(|e| BunkerError::GitOperationFailed {
            message: format!("Failed to discard local changes: {}", e.message()),
        })?;
    drop(repo);

    if let Some(bytes) = saved_metadata {
        std::fs::write(&metadata_path, bytes).map_err(|e| BunkerError::FileWriteFailed {
            path: metadata_path.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Name of the currently checked-out branch, or "HEAD" when detached.
fn current_branch(repo: &Repository) -> Result<String> {
    let head = repo.head().map_err(|e| BunkerError::GitOperationFailed {
        message: format!("Failed to resolve HEAD: {}", e.message()),
    })?;
    if head.is_branch() {
        if let Some(name) = head.shorthand() {
            return Ok(name.to_string());
        }
    }
    Ok("HEAD".to_string())
}
