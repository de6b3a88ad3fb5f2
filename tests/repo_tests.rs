use std::{fs, path::Path, process::Command};

use chrono::{Duration, Local};
use nbgrade::repo::{CloneOutcome, add_commit, check_late, clone_or_update, discover_repos, last_commit_time};

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn make_repo(dir: &Path) {
    run_git(dir, &["init"]);
    run_git(dir, &["config", "user.name", "test-user"]);
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["commit", "--allow-empty", "-m", "initial"]);
}

#[test]
fn discover_repos_finds_only_git_directories() {
    let dir = tempfile::tempdir().expect("tempdir");

    let repo = dir.path().join("amaral");
    fs::create_dir(&repo).expect("mkdir");
    make_repo(&repo);

    fs::create_dir(dir.path().join("not-a-repo")).expect("mkdir");

    let repos = discover_repos(dir.path()).expect("discover");
    assert_eq!(repos, vec![repo]);
}

#[test]
fn last_commit_time_parses_the_author_date() {
    let dir = tempfile::tempdir().expect("tempdir");
    make_repo(dir.path());

    let timestamp = last_commit_time(dir.path()).expect("commit time");
    let age = Local::now().fixed_offset() - timestamp;
    assert!(age < Duration::minutes(5), "commit should be recent: {timestamp}");
}

#[test]
fn check_late_compares_against_the_deadline() {
    let dir = tempfile::tempdir().expect("tempdir");
    make_repo(dir.path());

    let now = Local::now().fixed_offset();
    assert!(check_late(dir.path(), now - Duration::hours(1)).expect("late check"));
    assert!(!check_late(dir.path(), now + Duration::hours(1)).expect("late check"));
}

#[test]
fn add_commit_records_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    make_repo(dir.path());

    fs::write(dir.path().join("feedback.ipynb"), "{}").expect("write file");
    add_commit(dir.path(), "feedback.ipynb", "Add grader feedback.").expect("commit");

    let output = Command::new("git")
        .args(["log", "-1", "--format=%s"])
        .current_dir(dir.path())
        .output()
        .expect("git log");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "Add grader feedback."
    );
}

#[test]
fn clone_skips_an_existing_cached_checkout() {
    let dir = tempfile::tempdir().expect("tempdir");

    let origin = dir.path().join("origin");
    fs::create_dir(&origin).expect("mkdir");
    make_repo(&origin);

    let dest = dir.path().join("clones").join("amaral");
    let url = origin.to_str().expect("utf-8 path");

    assert_eq!(
        clone_or_update(url, &dest, true).expect("clone"),
        CloneOutcome::Cloned
    );
    assert_eq!(
        clone_or_update(url, &dest, true).expect("clone again"),
        CloneOutcome::Skipped
    );
}

#[test]
fn clone_pulls_an_existing_checkout_when_the_cache_is_bypassed() {
    let dir = tempfile::tempdir().expect("tempdir");

    let origin = dir.path().join("origin");
    fs::create_dir(&origin).expect("mkdir");
    make_repo(&origin);

    let dest = dir.path().join("clones").join("amaral");
    let url = origin.to_str().expect("utf-8 path");

    assert_eq!(
        clone_or_update(url, &dest, false).expect("clone"),
        CloneOutcome::Cloned
    );

    run_git(&origin, &["commit", "--allow-empty", "-m", "late submission"]);

    assert_eq!(
        clone_or_update(url, &dest, false).expect("update"),
        CloneOutcome::Updated
    );
    let output = Command::new("git")
        .args(["log", "-1", "--format=%s"])
        .current_dir(&dest)
        .output()
        .expect("git log");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "late submission"
    );
}
