//! Course configuration.
//!
//! Everything that used to live in ad-hoc per-quarter constants (base
//! repository URL, staff lists, the exercise points table) is carried in
//! one serde-backed `CourseConfig`, loaded from a JSON file next to the
//! working directory and passed explicitly to the code that needs it.

use std::{collections::BTreeMap, fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notebook::{
    exercise::Strategy,
    feedback::{DEFAULT_RUBRIC_CATEGORIES, GradePolicy, GradingMode},
};

/// Default config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "course.json";

/// Course-level settings shared by every subcommand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseConfig {
    /// Base URL for student repositories; assignment name and username are
    /// appended to form each clone URL. HTTPS or SSH.
    pub base_url: String,
    /// Path to the merged students CSV (emails and usernames).
    pub users: PathBuf,
    /// Hosting organization for the course.
    pub org: String,
    /// Usernames to exclude when enumerating students (instructors, TAs).
    pub admins: Vec<String>,
    /// Staff emails filtered out of every roster.
    pub ignore_emails: Vec<String>,
    /// Cell classification strategy.
    pub strategy: Strategy,
    /// Per-exercise grade cells or one rubric table per notebook.
    pub mode: GradingMode,
    /// Exercise-id -> points table, for exercise headers without an inline
    /// point count.
    pub points: BTreeMap<String, u32>,
    /// Rubric category labels, in table order.
    pub rubric_categories: Vec<String>,
    /// Header marking solution cells in instructor notebooks.
    pub solution_header: String,
    /// Glob matching the homework notebook inside a student repository.
    pub source_glob: String,
    /// File name of the feedback notebook written next to the homework.
    pub feedback_name: String,
    /// Year deadlines are interpreted in. Defaults to the current year.
    pub year: i32,
    /// UTC offset of the course timezone, in hours.
    pub utc_offset_hours: i32,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            base_url:          String::new(),
            users:             PathBuf::from("students.csv"),
            org:               String::new(),
            admins:            Vec::new(),
            ignore_emails:     Vec::new(),
            strategy:          Strategy::default(),
            mode:              GradingMode::default(),
            points:            BTreeMap::new(),
            rubric_categories: DEFAULT_RUBRIC_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            solution_header:   "#### SOLUTION".to_string(),
            source_glob:       "hw*.ipynb".to_string(),
            feedback_name:     "feedback.ipynb".to_string(),
            year:              Utc::now().year(),
            utc_offset_hours:  -8,
        }
    }
}

impl CourseConfig {
    /// Loads configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read config '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Could not parse config '{}'", path.display()))
    }

    /// Loads configuration, falling back to defaults (with a warning) when
    /// the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::load(path)
        } else {
            tracing::warn!("No config at '{}'; using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// The grading policy injected into the synthesizer and extractor.
    pub fn grade_policy(&self) -> GradePolicy {
        GradePolicy::builder()
            .strategy(self.strategy)
            .mode(self.mode)
            .points(self.points.clone())
            .categories(self.rubric_categories.clone())
            .build()
    }

    /// The course timezone as a fixed offset.
    pub fn timezone(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .with_context(|| format!("Invalid UTC offset: {}", self.utc_offset_hours))
    }

    /// Parses a deadline in `MM.DD hh:mm` form into the course year and
    /// timezone.
    pub fn deadline(&self, due: &str) -> Result<DateTime<FixedOffset>> {
        let naive = NaiveDateTime::parse_from_str(
            &format!("{}.{due}", self.year),
            "%Y.%m.%d %H:%M",
        )
        .with_context(|| format!("Could not parse deadline '{due}' as 'MM.DD hh:mm'"))?;

        naive
            .and_local_timezone(self.timezone()?)
            .single()
            .with_context(|| format!("Deadline '{due}' is ambiguous in the course timezone"))
    }

    /// The clone URL for one student's repository for one assignment.
    pub fn repo_url(&self, assignment: &str, username: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/{assignment}-{username}.git")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_uses_course_year_and_offset() {
        let config = CourseConfig {
            year: 2019,
            utc_offset_hours: -8,
            ..Default::default()
        };

        let deadline = config.deadline("01.18 02:00").expect("deadline parses");
        assert_eq!(deadline.to_rfc3339(), "2019-01-18T02:00:00-08:00");
    }

    #[test]
    fn repo_url_joins_base_assignment_and_user() {
        let config = CourseConfig {
            base_url: "https://github.com/2019-winter-sta141b/".to_string(),
            ..Default::default()
        };

        assert_eq!(
            config.repo_url("hw2", "octocat"),
            "https://github.com/2019-winter-sta141b/hw2-octocat.git"
        );
    }
}
