//! Git metadata for in-cluster builds

use std::path::Path;

use git2::Repository;
use kompose_common::{Error, Result};
use kompose_transform::GitInfo;

/// [`GitInfo`] reading the repository with libgit2
#[derive(Clone, Copy, Debug, Default)]
pub struct Git2Info;

impl Git2Info {
    /// Create a reader
    pub fn new() -> Self {
        Self
    }
}

fn open(dir: &Path, context: &str) -> Result<Repository> {
    Repository::discover(dir).map_err(|e| {
        Error::git(
            context,
            format!("{} is not inside a git repository: {}", dir.display(), e.message()),
        )
    })
}

/// Append `.git` to a remote URL that lacks it
fn with_git_suffix(url: &str) -> String {
    if url.ends_with(".git") {
        url.to_string()
    } else {
        format!("{url}.git")
    }
}

impl GitInfo for Git2Info {
    fn is_available(&self) -> bool {
        // libgit2 is linked in; there is no external binary to look for
        true
    }

    fn remote_url(&self, dir: &Path) -> Result<String> {
        let repo = open(dir, "remote")?;
        let remotes = repo
            .remotes()
            .map_err(|e| Error::git("remote", e.message().to_string()))?;
        let name = if remotes.iter().flatten().any(|r| r == "origin") {
            "origin".to_string()
        } else {
            remotes
                .iter()
                .flatten()
                .next()
                .map(str::to_string)
                .ok_or_else(|| Error::git("remote", "repository has no remotes"))?
        };
        let remote = repo
            .find_remote(&name)
            .map_err(|e| Error::git("remote", e.message().to_string()))?;
        let url = remote
            .url()
            .ok_or_else(|| Error::git("remote", format!("remote {name} has no URL")))?;
        Ok(with_git_suffix(url))
    }

    fn branch(&self, dir: &Path) -> Result<String> {
        let repo = open(dir, "branch")?;
        let head = repo
            .head()
            .map_err(|e| Error::git("branch", e.message().to_string()))?;
        if !head.is_branch() {
            return Err(Error::git("branch", "HEAD is detached"));
        }
        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| Error::git("branch", "branch name is not valid UTF-8"))
    }

    fn prefix(&self, dir: &Path) -> Result<String> {
        let repo = open(dir, "prefix")?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| Error::git("prefix", "repository is bare"))?;
        let canonical = |p: &Path| {
            p.canonicalize()
                .map_err(|e| Error::git("prefix", format!("{}: {e}", p.display())))
        };
        let (root, dir) = (canonical(workdir)?, canonical(dir)?);
        let relative = dir.strip_prefix(&root).map_err(|_| {
            Error::git(
                "prefix",
                format!("{} is outside {}", dir.display(), root.display()),
            )
        })?;

        let mut prefix: String = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if !prefix.is_empty() {
            prefix.push('/');
        }
        Ok(prefix)
    }
}
