//! Git operations for git-sourced cookbooks.
//!
//! Handles cloning, fetching, and checking out git repositories. Cookbooks
//! sourced from git are addressed by a repository URL plus an optional
//! revision/ref/tag/branch, resolved with the precedence described in
//! `SPEC_FULL.md` §4.3: revision > ref > tag > branch > default branch.

use crate::version::Version;
use git2::{Cred, CredentialType, RemoteCallbacks, Repository, build::CheckoutBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to clone {repo}: {source}")]
    CloneError {
        repo: String,
        #[source]
        source: git2::Error,
    },

    #[error("failed to fetch {repo}: {source}")]
    FetchError {
        repo: String,
        #[source]
        source: git2::Error,
    },

    #[error("failed to checkout {checkout_ref} in {repo}: {source}")]
    CheckoutError {
        repo: String,
        checkout_ref: String,
        #[source]
        source: git2::Error,
    },

    #[error("no ref found for {checkout_ref} in {repo}")]
    RefNotFound { repo: String, checkout_ref: String },

    #[error("failed to create git cache directory at {path}: {source}")]
    CacheInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What to check out, in the precedence order the caller should try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutTarget {
    Revision(String),
    Ref(String),
    Tag(String),
    Branch(String),
    DefaultBranch,
}

/// Resolve the explicit checkout fields on a git source into a single
/// target, honoring revision > ref > tag > branch > default branch.
#[must_use]
pub fn resolve_checkout_target(
    revision: Option<&str>,
    git_ref: Option<&str>,
    tag: Option<&str>,
    branch: Option<&str>,
) -> CheckoutTarget {
    if let Some(r) = revision {
        return CheckoutTarget::Revision(r.to_string());
    }
    if let Some(r) = git_ref {
        return CheckoutTarget::Ref(r.to_string());
    }
    if let Some(t) = tag {
        return CheckoutTarget::Tag(t.to_string());
    }
    if let Some(b) = branch {
        return CheckoutTarget::Branch(b.to_string());
    }
    CheckoutTarget::DefaultBranch
}

/// Manages the on-disk clone cache for git-sourced cookbooks.
#[derive(Debug)]
pub struct GitManager {
    cache_dir: PathBuf,
}

impl GitManager {
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new(cache_dir: PathBuf) -> Result<Self, GitError> {
        std::fs::create_dir_all(&cache_dir).map_err(|source| GitError::CacheInit {
            path: cache_dir.clone(),
            source,
        })?;
        Ok(Self { cache_dir })
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Converts a repository URL into a safe, stable directory name.
    ///
    /// Example: `https://github.com/sous-chefs/nginx.git` -> `https___github_com_sous-chefs_nginx_git`
    #[must_use]
    pub fn repo_name_from_url(url: &str) -> String {
        url.replace(['/', ':', '.'], "_")
    }

    /// Clone (if absent) or fetch (if present) the repository, then check
    /// out the resolved target.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if cloning, fetching, or checkout fails.
    pub fn checkout(&self, repository_url: &str, target: &CheckoutTarget) -> Result<PathBuf, GitError> {
        let repo_path = self.cache_dir.join(Self::repo_name_from_url(repository_url));

        let repo = if repo_path.exists() {
            let repo = Repository::open(&repo_path).map_err(|e| GitError::CloneError {
                repo: repository_url.to_string(),
                source: e,
            })?;
            self.fetch(&repo, repository_url)?;
            repo
        } else {
            let repo = Repository::init(&repo_path).map_err(|e| GitError::CloneError {
                repo: repository_url.to_string(),
                source: e,
            })?;
            repo.remote("origin", repository_url)
                .map_err(|e| GitError::CloneError {
                    repo: repository_url.to_string(),
                    source: e,
                })?;
            self.fetch(&repo, repository_url)?;
            repo
        };

        let oid = self.resolve_oid(&repo, repository_url, target)?;

        let commit = repo
            .find_commit(oid)
            .map_err(|e| GitError::CheckoutError {
                repo: repository_url.to_string(),
                checkout_ref: format!("{target:?}"),
                source: e,
            })?;

        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))
            .map_err(|e| GitError::CheckoutError {
                repo: repository_url.to_string(),
                checkout_ref: format!("{target:?}"),
                source: e,
            })?;

        repo.set_head_detached(oid)
            .map_err(|e| GitError::CheckoutError {
                repo: repository_url.to_string(),
                checkout_ref: format!("{target:?}"),
                source: e,
            })?;

        Ok(repo_path)
    }

    fn fetch(&self, repo: &Repository, repository_url: &str) -> Result<(), GitError> {
        let mut remote = repo
            .find_remote("origin")
            .or_else(|_| repo.remote_anonymous(repository_url))
            .map_err(|e| GitError::FetchError {
                repo: repository_url.to_string(),
                source: e,
            })?;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(credentials_callback);
        let mut opts = git2::FetchOptions::new();
        opts.remote_callbacks(callbacks);

        remote
            .fetch(
                &["refs/heads/*:refs/remotes/origin/*", "refs/tags/*:refs/tags/*"],
                Some(&mut opts),
                None,
            )
            .map_err(|e| GitError::FetchError {
                repo: repository_url.to_string(),
                source: e,
            })
    }

    fn resolve_oid(
        &self,
        repo: &Repository,
        repository_url: &str,
        target: &CheckoutTarget,
    ) -> Result<git2::Oid, GitError> {
        let not_found = |checkout_ref: &str| GitError::RefNotFound {
            repo: repository_url.to_string(),
            checkout_ref: checkout_ref.to_string(),
        };

        match target {
            CheckoutTarget::Revision(rev) => {
                git2::Oid::from_str(rev).map_err(|_| not_found(rev))
            }
            CheckoutTarget::Ref(r) => repo
                .revparse_single(r)
                .map(|obj| obj.id())
                .or_else(|_| {
                    repo.revparse_single(&format!("refs/heads/{r}"))
                        .map(|obj| obj.id())
                })
                .map_err(|_| not_found(r)),
            CheckoutTarget::Tag(t) => repo
                .revparse_single(&format!("refs/tags/{t}"))
                .map(|obj| obj.id())
                .map_err(|_| not_found(t)),
            CheckoutTarget::Branch(b) => repo
                .revparse_single(&format!("refs/heads/{b}"))
                .or_else(|_| repo.revparse_single(&format!("refs/remotes/origin/{b}")))
                .map(|obj| obj.id())
                .map_err(|_| not_found(b)),
            CheckoutTarget::DefaultBranch => repo
                .revparse_single("refs/remotes/origin/master")
                .or_else(|_| repo.revparse_single("refs/remotes/origin/main"))
                .map(|obj| obj.id())
                .map_err(|_| not_found("master/main")),
        }
    }

    /// Enumerate tags as versions; falls back to a single synthetic
    /// `0.0.0` entry when the repository has no parseable version tags.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if the repository cannot be opened.
    pub fn tag_versions(&self, repository_url: &str) -> Result<Vec<Version>, GitError> {
        let repo_path = self.cache_dir.join(Self::repo_name_from_url(repository_url));
        let repo = Repository::open(&repo_path).map_err(|e| GitError::CloneError {
            repo: repository_url.to_string(),
            source: e,
        })?;

        let tags = repo.tag_names(None).map_err(|e| GitError::FetchError {
            repo: repository_url.to_string(),
            source: e,
        })?;

        let mut versions: Vec<Version> = tags
            .iter()
            .flatten()
            .filter_map(|name| Version::parse(name).ok())
            .collect();

        if versions.is_empty() {
            versions.push(Version::new(0, 0, 0));
        }
        Ok(versions)
    }
}

/// SSH-agent-then-key-file, then HTTPS basic-auth-or-token credential
/// resolution, in that precedence order.
fn credentials_callback(
    url: &str,
    username_from_url: Option<&str>,
    allowed_types: CredentialType,
) -> Result<Cred, git2::Error> {
    let username = username_from_url.unwrap_or("git");

    if allowed_types.contains(CredentialType::SSH_KEY) {
        if let Ok(cred) = Cred::ssh_key_from_agent(username) {
            return Ok(cred);
        }
        if let Some(home) = dirs::home_dir() {
            for key_name in ["id_ed25519", "id_rsa"] {
                let private = home.join(".ssh").join(key_name);
                if private.exists() {
                    return Cred::ssh_key(username, None, &private, None);
                }
            }
        }
    }

    if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
        if let Ok(token) = std::env::var("CHEF_GIT_TOKEN") {
            return Cred::userpass_plaintext(username, &token);
        }
        if let (Ok(user), Ok(pass)) = (
            std::env::var("CHEF_GIT_USERNAME"),
            std::env::var("CHEF_GIT_PASSWORD"),
        ) {
            return Cred::userpass_plaintext(&user, &pass);
        }
    }

    Cred::default().map_err(|e| {
        git2::Error::from_str(&format!("no credentials available for {url}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_name_is_stable_and_safe() {
        assert_eq!(
            GitManager::repo_name_from_url("https://github.com/sous-chefs/nginx.git"),
            "https___github_com_sous-chefs_nginx_git"
        );
    }

    #[test]
    fn checkout_precedence_revision_wins() {
        let target = resolve_checkout_target(Some("abc123"), Some("v1"), Some("v2"), Some("main"));
        assert_eq!(target, CheckoutTarget::Revision("abc123".to_string()));
    }

    #[test]
    fn checkout_precedence_falls_back_to_default_branch() {
        let target = resolve_checkout_target(None, None, None, None);
        assert_eq!(target, CheckoutTarget::DefaultBranch);
    }

    #[test]
    fn checkout_precedence_tag_before_branch() {
        let target = resolve_checkout_target(None, None, Some("v2.0.0"), Some("main"));
        assert_eq!(target, CheckoutTarget::Tag("v2.0.0".to_string()));
    }

    #[test]
    fn manager_creation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = GitManager::new(temp_dir.path().to_path_buf()).unwrap();
        assert!(manager.cache_dir().exists());
    }
}
