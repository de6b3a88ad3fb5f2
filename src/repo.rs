//! Git operations over collections of student repositories.
//!
//! Everything shells out to the `git` binary, so whatever credential
//! helpers the instructor already has configured (SSH agent, credential
//! manager) just work. Each repository is handled independently; a failed
//! clone is a warning and the batch continues.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset};
use colored::Colorize;
use which::which;

/// What `clone_or_update` did with one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneOutcome {
    /// A fresh clone was created.
    Cloned,
    /// An existing clone was fast-forwarded from origin.
    Updated,
    /// The clone already existed and was left alone.
    Skipped,
}

/// Locates the git binary on the path.
fn git_path() -> Result<PathBuf> {
    which("git").context("Cannot find git on path")
}

/// Runs git with the given arguments in a directory, returning stdout.
fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new(git_path()?)
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("Could not run git {}", args.join(" ")))?;

    if !output.status.success() {
        bail!(
            "git {} failed in '{}': {}",
            args.join(" "),
            dir.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Clones a repository to `dest`. An existing clone is skipped when
/// `use_cache` is set, and fast-forwarded from origin otherwise.
pub fn clone_or_update(url: &str, dest: &Path, use_cache: bool) -> Result<CloneOutcome> {
    if dest.join(".git").is_dir() {
        if use_cache {
            tracing::info!("Skipped '{}'", dest.display());
            return Ok(CloneOutcome::Skipped);
        }
        run_git(dest, &["pull", "--ff-only"])?;
        tracing::info!("Updated '{}'", dest.display());
        return Ok(CloneOutcome::Updated);
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create '{}'", parent.display()))?;
    }

    let dest_str = dest
        .to_str()
        .context("Could not convert clone destination to string")?;

    let output = Command::new(git_path()?)
        .args(["clone", url, dest_str])
        .output()
        .context("Could not run git clone")?;

    if !output.status.success() {
        bail!(
            "Failed to clone '{url}': {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    tracing::info!("Cloned '{}'", dest.display());
    Ok(CloneOutcome::Cloned)
}

/// Finds all repositories directly under a path: every immediate
/// subdirectory containing a `.git` directory, in name order.
pub fn discover_repos(path: &Path) -> Result<Vec<PathBuf>> {
    let mut repos: Vec<PathBuf> = std::fs::read_dir(path)
        .with_context(|| format!("Could not read '{}'", path.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.join(".git").is_dir())
        .collect();
    repos.sort();
    Ok(repos)
}

/// The author timestamp of the latest commit in a repository.
pub fn last_commit_time(repo: &Path) -> Result<DateTime<FixedOffset>> {
    let stdout = run_git(repo, &["log", "-1", "--format=%aI"])?;
    let stamp = stdout.trim();
    DateTime::parse_from_rfc3339(stamp)
        .with_context(|| format!("Could not parse commit timestamp '{stamp}'"))
}

/// Checks whether a repository's latest commit is past the deadline,
/// printing a highlighted notice when it is.
pub fn check_late(repo: &Path, deadline: DateTime<FixedOffset>) -> Result<bool> {
    let timestamp = last_commit_time(repo)?;
    let is_late = timestamp > deadline;

    if is_late {
        let name = repo
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| repo.display().to_string());
        println!("{} ({name}): {timestamp}", "Late".red().bold());
    }

    Ok(is_late)
}

/// Stages one file and commits it.
pub fn add_commit(repo: &Path, file: &str, message: &str) -> Result<()> {
    run_git(repo, &["add", file])?;
    run_git(repo, &["commit", "-m", message])?;
    tracing::info!("Committed '{file}' in '{}'", repo.display());
    Ok(())
}

/// Pushes the current branch to origin.
pub fn push(repo: &Path) -> Result<()> {
    run_git(repo, &["push", "origin", "HEAD"])?;
    tracing::info!("Pushed '{}'", repo.display());
    Ok(())
}
