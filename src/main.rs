#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # nbgrade
//!
//! Command-line entry point for the instructor tools: cloning student
//! repositories, preparing feedback notebooks, collecting grades, and
//! merging rosters.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bpaf::*;
use dotenvy::dotenv;
use nbgrade::{
    config::{CONFIG_FILE, CourseConfig},
    hosting::{GitHubHost, fetch_submissions},
    notebook::{
        self,
        exercise::Classifier,
        extract::collect_grades,
        feedback::init_feedback_all,
    },
    repo,
    report,
    roster,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Clone every student's repository for an assignment.
    Clone {
        /// Directory to clone into.
        dest:      PathBuf,
        /// Assignment name.
        name:      String,
        /// Students file overriding the configured one.
        users:     Option<PathBuf>,
        /// Re-pull cached clones instead of skipping them.
        overwrite: bool,
    },
    /// Prepare every repository in a directory for grading.
    Grade {
        /// Directory of cloned repositories.
        path: PathBuf,
        /// Due date in `MM.DD hh:mm` form; late repos are flagged.
        due:  Option<String>,
    },
    /// Extract grades from filled-in feedback notebooks.
    Collect {
        /// Directory of graded repositories or notebooks.
        path:       PathBuf,
        /// Output CSV of (student, score) pairs.
        out:        PathBuf,
        /// Also write a Canvas gradebook import under this assignment
        /// column name.
        assignment: Option<String>,
    },
    /// Commit the feedback notebook in every repository.
    Commit {
        /// Directory of cloned repositories.
        path:    PathBuf,
        /// Commit message.
        message: String,
    },
    /// Push every repository to origin.
    Push {
        /// Directory of cloned repositories.
        path: PathBuf,
    },
    /// Merge roster exports into the canonical students file.
    Merge {
        /// Canvas gradebook export.
        canvas: PathBuf,
        /// Photo roster CSV export.
        photo:  PathBuf,
        /// Piazza statistics export.
        piazza: PathBuf,
        /// GitHub Classroom roster.
        github: PathBuf,
        /// Output students CSV.
        out:    PathBuf,
    },
    /// Fetch one file from every matching repository in the organization.
    Fetch {
        /// File to fetch from each repository.
        file:   String,
        /// Term to require in repository names.
        search: String,
        /// Output directory.
        target: PathBuf,
    },
    /// Strip solution cells from an instructor notebook.
    Strip {
        /// Path to the `-solutions.ipynb` notebook.
        source: PathBuf,
    },
    /// Remove grade cells from every notebook in a directory.
    Clean {
        /// Directory of notebooks.
        path: PathBuf,
    },
}

/// Parsed command line: config path plus the chosen subcommand.
#[derive(Debug, Clone)]
struct Options {
    /// Path to the course configuration file.
    config: PathBuf,
    /// The subcommand to run.
    cmd:    Cmd,
}

/// Parses the command line.
fn options() -> Options {
    /// Parses a positional path argument.
    fn p(name: &'static str, help: &'static str) -> impl Parser<PathBuf> {
        positional::<PathBuf>(name).help(help)
    }

    let clone = {
        let dest = p("DEST", "Directory to clone into");
        let name = positional::<String>("NAME").help("Assignment name");
        let users = p("USERS", "Students file (defaults to configured one)").optional();
        let overwrite = long("overwrite")
            .help("Pull cached repositories instead of skipping them")
            .switch();
        construct!(Cmd::Clone {
            overwrite,
            dest,
            name,
            users
        })
        .to_options()
        .command("clone")
        .help("Clone all student repositories for an assignment")
    };

    let grade = {
        let path = p("PATH", "Directory of cloned repositories");
        let due = positional::<String>("DUE")
            .help("Due date in 'MM.DD hh:mm' form")
            .optional();
        construct!(Cmd::Grade { path, due })
            .to_options()
            .command("grade")
            .help("Create feedback notebooks with grading cells")
    };

    let collect = {
        let out = long("out")
            .help("Output CSV of (student, score) pairs")
            .argument::<PathBuf>("FILE")
            .fallback(PathBuf::from("grades.csv"));
        let assignment = long("assignment")
            .help("Also write a Canvas import with this assignment column")
            .argument::<String>("NAME")
            .optional();
        let path = p("PATH", "Directory of graded repositories or notebooks");
        construct!(Cmd::Collect {
            out,
            assignment,
            path
        })
        .to_options()
        .command("collect")
        .help("Extract grades from filled-in feedback notebooks")
    };

    let commit = {
        let path = p("PATH", "Directory of cloned repositories");
        let message = positional::<String>("MESSAGE").help("Commit message");
        construct!(Cmd::Commit { path, message })
            .to_options()
            .command("commit")
            .help("Commit the feedback notebook in every repository")
    };

    let push = {
        let path = p("PATH", "Directory of cloned repositories");
        construct!(Cmd::Push { path })
            .to_options()
            .command("push")
            .help("Push every repository to origin")
    };

    let merge = {
        let canvas = p("CANVAS", "Canvas gradebook export");
        let photo = p("PHOTO", "Photo roster CSV export");
        let piazza = p("PIAZZA", "Piazza statistics export");
        let github = p("GITHUB", "GitHub Classroom roster");
        let out = long("out")
            .help("Output students CSV")
            .argument::<PathBuf>("FILE")
            .fallback(PathBuf::from("students.csv"));
        construct!(Cmd::Merge {
            out,
            canvas,
            photo,
            piazza,
            github
        })
        .to_options()
        .command("merge")
        .help("Merge roster exports into the canonical students file")
    };

    let fetch = {
        let file = positional::<String>("FILE").help("File to fetch from each repository");
        let search = positional::<String>("SEARCH")
            .help("Term to require in repository names")
            .fallback(String::new());
        let target = p("TARGET", "Output directory").fallback(PathBuf::from("submissions"));
        construct!(Cmd::Fetch {
            file,
            search,
            target
        })
        .to_options()
        .command("fetch")
        .help("Fetch submissions through the hosting API")
    };

    let strip = {
        let source = p("SOURCE", "Path to the -solutions.ipynb notebook");
        construct!(Cmd::Strip { source })
            .to_options()
            .command("strip")
            .help("Strip solution cells from an instructor notebook")
    };

    let clean = {
        let path = p("PATH", "Directory of notebooks");
        construct!(Cmd::Clean { path })
            .to_options()
            .command("clean")
            .help("Remove grade cells from every notebook in a directory")
    };

    let cmd = construct!([clone, grade, collect, commit, push, merge, fetch, strip, clean]);
    let config = long("config")
        .help("Path to the course configuration file")
        .argument::<PathBuf>("FILE")
        .fallback(PathBuf::from(CONFIG_FILE));

    construct!(Options { config, cmd })
        .to_options()
        .descr("Instructor tools for notebook homework in git repositories")
        .run()
}

/// Clones every student's repository for one assignment.
fn do_clone(
    config: &CourseConfig,
    dest: &Path,
    name: &str,
    users: Option<&Path>,
    overwrite: bool,
) -> Result<()> {
    let students = roster::read_students(users.unwrap_or(&config.users))?;

    println!("Cloning repositories...");
    for student in &students {
        if student.github.is_empty() {
            tracing::warn!("No GitHub username for '{}'; skipping", student.email);
            continue;
        }

        let url = config.repo_url(name, &student.github);
        let repo_dest = dest.join(roster::email_local(&student.email));

        if let Err(error) = repo::clone_or_update(&url, &repo_dest, !overwrite) {
            tracing::warn!("{error:#}");
        }
    }

    Ok(())
}

/// Flags late repositories and writes a feedback notebook into each one.
fn do_grade(config: &CourseConfig, path: &Path, due: Option<&str>) -> Result<()> {
    let deadline = due.map(|due| config.deadline(due)).transpose()?;
    let policy = config.grade_policy();
    let repos = repo::discover_repos(path)?;

    if let Some(deadline) = deadline {
        for repo_dir in &repos {
            if let Err(error) = repo::check_late(repo_dir, deadline) {
                tracing::warn!("{error:#}");
            }
        }
    }

    let prepared =
        init_feedback_all(&repos, &policy, &config.source_glob, &config.feedback_name);
    println!("Prepared {prepared} of {} repositories.", repos.len());

    Ok(())
}

/// Extracts grades, prints the summary, and writes score files.
fn do_collect(
    config: &CourseConfig,
    path: &Path,
    out: &Path,
    assignment: Option<&str>,
) -> Result<()> {
    let classifier = Classifier::new(config.strategy);
    let records = collect_grades(
        path,
        &classifier,
        &config.rubric_categories,
        &config.feedback_name,
    )?;

    report::print_summary(&records);
    report::write_scores_csv(out, &records)?;

    if let Some(assignment) = assignment {
        let students = roster::read_students(&config.users)?;
        let scores = report::scores_by_student(&records);
        let gradebook = out.with_file_name("gradebook.csv");
        roster::write_canvas(&gradebook, &students, &scores, assignment)?;
        println!("Wrote '{}'.", gradebook.display());
    }

    Ok(())
}

/// Commits the feedback notebook in every repository.
fn do_commit(config: &CourseConfig, path: &Path, message: &str) -> Result<()> {
    for repo_dir in repo::discover_repos(path)? {
        if let Err(error) = repo::add_commit(&repo_dir, &config.feedback_name, message) {
            tracing::warn!("{error:#}");
        }
    }
    Ok(())
}

/// Pushes every repository to origin.
fn do_push(path: &Path) -> Result<()> {
    for repo_dir in repo::discover_repos(path)? {
        if let Err(error) = repo::push(&repo_dir) {
            tracing::warn!("{error:#}");
        }
    }
    Ok(())
}

/// Merges the roster exports and writes the students file.
fn do_merge(
    config: &CourseConfig,
    canvas: &Path,
    photo: &Path,
    piazza: &Path,
    github: &Path,
    out: &Path,
) -> Result<()> {
    let ignore = &config.ignore_emails;
    let students = roster::merge_students(
        &roster::read_canvas(canvas)?,
        &roster::read_photo_roster(photo, ignore)?,
        &roster::read_piazza(piazza, ignore)?,
        &roster::read_github(github, ignore)?,
    );

    roster::write_students(out, &students)?;
    println!("Wrote {} students to '{}'.", students.len(), out.display());
    Ok(())
}

/// Fetches submissions through the hosting API.
fn do_fetch(config: &CourseConfig, file: &str, search: &str, target: &Path) -> Result<()> {
    let token = std::env::var("GITHUB_TOKEN")
        .context("Set GITHUB_TOKEN (a personal access token) to use fetch")?;
    let host = GitHubHost::new(config.org.clone(), token)?;

    let missing = fetch_submissions(&host, search, file, target, &config.admins)?;
    if !missing.is_empty() {
        println!("\nNo submission found for:\n{}", missing.join("\n"));
    }

    println!("\nFinished!");
    Ok(())
}

/// Strips solution cells from an instructor notebook.
fn do_strip(config: &CourseConfig, source: &Path) -> Result<()> {
    let (out, removed) = notebook::strip_notebook(source, &config.solution_header)?;
    println!("Wrote '{}' ({removed} solution cells removed).", out.display());
    Ok(())
}

/// Removes grade cells from every notebook in a directory, in place.
fn do_clean(config: &CourseConfig, path: &Path) -> Result<()> {
    let classifier = Classifier::new(config.strategy);

    println!("Converting files...");
    let cleaned = notebook::clean_notebooks(path, &classifier)?;
    println!("All done! ({cleaned} notebooks cleaned)");
    Ok(())
}

fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let options = options();
    let config = CourseConfig::load_or_default(&options.config)?;

    match options.cmd {
        Cmd::Clone {
            dest,
            name,
            users,
            overwrite,
        } => do_clone(&config, &dest, &name, users.as_deref(), overwrite),
        Cmd::Grade { path, due } => do_grade(&config, &path, due.as_deref()),
        Cmd::Collect {
            path,
            out,
            assignment,
        } => do_collect(&config, &path, &out, assignment.as_deref()),
        Cmd::Commit { path, message } => do_commit(&config, &path, &message),
        Cmd::Push { path } => do_push(&path),
        Cmd::Merge {
            canvas,
            photo,
            piazza,
            github,
            out,
        } => do_merge(&config, &canvas, &photo, &piazza, &github, &out),
        Cmd::Fetch {
            file,
            search,
            target,
        } => do_fetch(&config, &file, &search, &target),
        Cmd::Strip { source } => do_strip(&config, &source),
        Cmd::Clean { path } => do_clean(&config, &path),
    }
}
