//! Roster readers and the merge-by-email pipeline.
//!
//! Four sources describe the same students in four shapes: the Canvas
//! gradebook export, the institutional photo roster, the Piazza statistics
//! export, and the GitHub Classroom roster. Merging joins them into one
//! canonical table keyed by email, reporting every row that fails to
//! match so the instructor can follow up by hand.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Number of banner rows before the header in a photo roster export.
const ROSTER_SKIPROWS: usize = 8;

/// Canvas columns required for a gradebook import.
pub const CANVAS_COLS: [&str; 5] = ["Student", "ID", "SIS User ID", "SIS Login ID", "Section"];

/// One row of the GitHub Classroom roster.
#[derive(Debug, Clone)]
pub struct GithubRow {
    /// Student email.
    pub email:  String,
    /// GitHub username.
    pub github: String,
}

/// One row of the institutional photo roster.
#[derive(Debug, Clone)]
pub struct PhotoRow {
    /// Institutional student id (the SIS id Canvas knows).
    pub id:         String,
    /// Last name.
    pub last_name:  String,
    /// First name.
    pub first_name: String,
    /// Student email.
    pub email:      String,
}

/// One row of the Piazza statistics export.
#[derive(Debug, Clone, Deserialize)]
pub struct PiazzaRow {
    /// Display name on Piazza.
    pub name:  String,
    /// Email registered with Piazza.
    pub email: String,
}

/// One row of the Canvas gradebook export. Only the import-relevant
/// columns are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasRow {
    /// Student display name.
    #[serde(rename = "Student")]
    pub student:      String,
    /// Canvas-internal id.
    #[serde(rename = "ID")]
    pub id:           String,
    /// Institutional (SIS) id; blank for test students.
    #[serde(rename = "SIS User ID")]
    pub sis_user_id:  String,
    /// Institutional login id.
    #[serde(rename = "SIS Login ID")]
    pub sis_login_id: String,
    /// Section label.
    #[serde(rename = "Section")]
    pub section:      String,
}

/// One row of the merged canonical student table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    /// Student display name (from Canvas).
    #[serde(rename = "Student")]
    pub student:      String,
    /// Canvas-internal id.
    #[serde(rename = "ID")]
    pub id:           String,
    /// Institutional (SIS) id.
    #[serde(rename = "SIS User ID")]
    pub sis_user_id:  String,
    /// Institutional login id.
    #[serde(rename = "SIS Login ID")]
    pub sis_login_id: String,
    /// Section label.
    #[serde(rename = "Section")]
    pub section:      String,
    /// Email from the photo roster; the canonical join key.
    pub email:        String,
    /// Last name from the photo roster.
    pub last_name:    String,
    /// First name from the photo roster.
    pub first_name:   String,
    /// GitHub username, when the classroom roster had one.
    pub github:       String,
}

/// The local part of an email address, which doubles as the student's
/// repository directory name.
pub fn email_local(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Reads the GitHub Classroom roster. Columns are positional
/// (email, username, user id, display name); staff emails are dropped.
pub fn read_github(path: &Path, ignore: &[String]) -> Result<Vec<GithubRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Could not read GitHub roster '{}'", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let email = record.get(0).unwrap_or_default().to_string();
        if ignore.contains(&email) {
            continue;
        }
        rows.push(GithubRow {
            email,
            github: record.get(1).unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}

/// Reads the photo roster CSV export. The export starts with eight banner
/// rows before the header; columns are positional (id, last name, first
/// name, status, section, email, level, class).
pub fn read_photo_roster(path: &Path, ignore: &[String]) -> Result<Vec<PhotoRow>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Could not read photo roster '{}'", path.display()))?;
    let body = text.lines().skip(ROSTER_SKIPROWS).join("\n");

    let mut reader = ReaderBuilder::new().from_reader(body.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let email = record.get(5).unwrap_or_default().to_string();
        if ignore.contains(&email) {
            continue;
        }
        rows.push(PhotoRow {
            id: record.get(0).unwrap_or_default().to_string(),
            last_name: record.get(1).unwrap_or_default().to_string(),
            first_name: record.get(2).unwrap_or_default().to_string(),
            email,
        });
    }
    Ok(rows)
}

/// Reads the Piazza statistics export, keeping name and email.
pub fn read_piazza(path: &Path, ignore: &[String]) -> Result<Vec<PiazzaRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Could not read Piazza export '{}'", path.display()))?;

    let mut rows = Vec::new();
    for row in reader.deserialize::<PiazzaRow>() {
        let row = row?;
        if !ignore.contains(&row.email) {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Reads the Canvas gradebook export.
pub fn read_canvas(path: &Path) -> Result<Vec<CanvasRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Could not read Canvas export '{}'", path.display()))?;

    let mut rows = Vec::new();
    for row in reader.deserialize::<CanvasRow>() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Merges the four sources into the canonical student table.
///
/// Canvas rows join the photo roster on SIS id (that is where emails come
/// from), Piazza and GitHub then join by email. Every failed join is
/// reported as a warning; for missing Piazza matches, candidate rows whose
/// display name contains the student's last name are suggested.
pub fn merge_students(
    canvas: &[CanvasRow],
    photo: &[PhotoRow],
    piazza: &[PiazzaRow],
    github: &[GithubRow],
) -> Vec<Student> {
    let by_sis: BTreeMap<&str, &PhotoRow> =
        photo.iter().map(|row| (row.id.as_str(), row)).collect();
    let github_by_email: BTreeMap<&str, &GithubRow> =
        github.iter().map(|row| (row.email.as_str(), row)).collect();

    let mut students = Vec::new();

    for row in canvas {
        // Canvas test students have no SIS id.
        if row.sis_user_id.is_empty() {
            continue;
        }

        let Some(matched) = by_sis.get(row.sis_user_id.as_str()) else {
            tracing::warn!("No SIS id match for '{}' ({})", row.student, row.sis_user_id);
            continue;
        };

        let github = match github_by_email.get(matched.email.as_str()) {
            Some(gh) => gh.github.clone(),
            None => {
                tracing::warn!("No GitHub username for '{}' ({})", row.student, matched.email);
                String::new()
            }
        };

        if !piazza.iter().any(|p| p.email == matched.email) {
            let candidates = piazza
                .iter()
                .filter(|p| {
                    p.name
                        .to_lowercase()
                        .contains(&matched.last_name.to_lowercase())
                })
                .map(|p| format!("{} <{}>", p.name, p.email))
                .join(", ");
            tracing::warn!(
                "No Piazza email match for '{}' ({}); candidates: [{candidates}]",
                row.student,
                matched.email
            );
        }

        students.push(Student {
            student: row.student.clone(),
            id: row.id.clone(),
            sis_user_id: row.sis_user_id.clone(),
            sis_login_id: row.sis_login_id.clone(),
            section: row.section.clone(),
            email: matched.email.clone(),
            last_name: matched.last_name.clone(),
            first_name: matched.first_name.clone(),
            github,
        });
    }

    students
}

/// Writes the merged student table.
pub fn write_students(path: &Path, students: &[Student]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Could not write students file '{}'", path.display()))?;
    for student in students {
        writer.serialize(student)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a merged student table back.
pub fn read_students(path: &Path) -> Result<Vec<Student>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Could not read students file '{}'", path.display()))?;

    let mut rows = Vec::new();
    for row in reader.deserialize::<Student>() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Writes a Canvas gradebook-import CSV: the five required Canvas columns
/// plus one assignment score column. Null scores stay blank so Canvas
/// leaves those grades untouched.
pub fn write_canvas(
    path: &Path,
    students: &[Student],
    scores: &BTreeMap<String, Option<f64>>,
    assignment: &str,
) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Could not write gradebook '{}'", path.display()))?;

    let mut header: Vec<&str> = CANVAS_COLS.to_vec();
    header.push(assignment);
    writer.write_record(&header)?;

    for student in students {
        let score = scores
            .get(email_local(&student.email))
            .copied()
            .flatten()
            .map(|s| s.to_string())
            .unwrap_or_default();

        writer.write_record([
            student.student.as_str(),
            student.id.as_str(),
            student.sis_user_id.as_str(),
            student.sis_login_id.as_str(),
            student.section.as_str(),
            score.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
