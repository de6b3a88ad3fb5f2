//! Parsing filled-in grade cells back into numeric scores.
//!
//! Extraction is deliberately all-or-nothing per notebook: if any rubric
//! score field fails to parse, the whole notebook is reported ungradeable
//! and partial sums are discarded. Incomplete grading never silently
//! produces a wrong partial score.

use std::path::Path;

use anyhow::Result;

use super::{GradeError, Notebook, exercise::Classifier};

/// One scored notebook: the student identifier (derived from the
/// repository or file name) and the score, or `None` when ungradeable.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    /// Student identifier.
    pub student: String,
    /// Total score, or `None` for an ungradeable notebook.
    pub score:   Option<f64>,
}

/// The first non-empty field of a table row, used to find the category
/// rows bounding the rubric.
fn row_label(line: &str) -> &str {
    line.trim()
        .trim_start_matches('|')
        .split('|')
        .next()
        .unwrap_or("")
        .trim()
}

/// The trailing score field of a table row.
fn row_score(line: &str) -> &str {
    line.trim_end()
        .trim_end_matches('|')
        .rsplit('|')
        .next()
        .unwrap_or("")
        .trim()
}

/// Sums the score column of the rubric rows bounded inclusively by the
/// first and last category labels. Any row whose score field fails to
/// parse makes the whole table unscorable.
fn rubric_total(text: &str, first: &str, last: &str) -> Result<f64, String> {
    let lines: Vec<&str> = text.lines().collect();

    let start = lines
        .iter()
        .position(|line| row_label(line) == first)
        .ok_or_else(|| format!("no '{first}' row in the grade cell"))?;
    let end = lines
        .iter()
        .position(|line| row_label(line) == last)
        .ok_or_else(|| format!("no '{last}' row in the grade cell"))?;

    if end < start {
        return Err(format!("'{last}' row appears before '{first}' row"));
    }

    let mut total = 0.0;
    for line in &lines[start..=end] {
        let field = row_score(line);
        let score: f64 = field
            .parse()
            .map_err(|_| format!("'{}' row has unparseable score '{field}'", row_label(line)))?;
        total += score;
    }

    Ok(total)
}

/// Extracts the total score from a notebook's grade cell. A missing grade
/// cell, or any unparseable score field, makes the notebook ungradeable.
pub fn extract_score(
    notebook: &Notebook,
    classifier: &Classifier,
    categories: &[String],
    name: &str,
) -> Result<f64, GradeError> {
    let ungradeable = |reason: String| GradeError::UngradeableNotebook {
        notebook: name.to_string(),
        reason,
    };

    let grade_cell = notebook
        .cells
        .iter()
        .find(|cell| classifier.is_grade(cell))
        .ok_or_else(|| ungradeable("no grade cell".to_string()))?;

    let (first, last) = match (categories.first(), categories.last()) {
        (Some(first), Some(last)) => (first.as_str(), last.as_str()),
        _ => return Err(ungradeable("no rubric categories configured".to_string())),
    };

    rubric_total(&grade_cell.source, first, last).map_err(ungradeable)
}

/// Scores every notebook under a directory. Each immediate subdirectory is
/// treated as a student repository containing a feedback notebook; a bare
/// `.ipynb` file is treated as a single-file submission named after the
/// student. Failures are recorded as null scores and the batch continues.
pub fn collect_grades(
    dir: &Path,
    classifier: &Classifier,
    categories: &[String],
    feedback_name: &str,
) -> Result<Vec<GradeRecord>> {
    let mut records = Vec::new();

    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(Result::ok).collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();

        let (student, notebook_path) = if path.is_dir() {
            (
                entry.file_name().to_string_lossy().into_owned(),
                path.join(feedback_name),
            )
        } else if path.extension().is_some_and(|ext| ext == "ipynb") {
            (
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path.clone(),
            )
        } else {
            continue;
        };

        if !notebook_path.is_file() {
            tracing::warn!(
                "{}",
                GradeError::UngradeableNotebook {
                    notebook: student.clone(),
                    reason:   format!("no '{feedback_name}' file"),
                }
            );
            records.push(GradeRecord { student, score: None });
            continue;
        }

        let score = match Notebook::read(&notebook_path) {
            Ok(notebook) => match extract_score(&notebook, classifier, categories, &student) {
                Ok(total) => Some(total),
                Err(warning) => {
                    tracing::warn!("{warning}");
                    None
                }
            },
            Err(error) => {
                tracing::warn!("Could not load '{}': {error:#}", notebook_path.display());
                None
            }
        };

        records.push(GradeRecord { student, score });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_fields_ignore_table_pipes() {
        assert_eq!(row_label("| R1 | 5 |"), "R1");
        assert_eq!(row_score("| R1 | 5 |"), "5");
        assert_eq!(row_score("R2 | 3"), "3");
        assert_eq!(row_score("| F1 |  |"), "");
    }

    #[test]
    fn rubric_total_sums_inclusive_range() {
        let text = "header\n| R1 | 5 |\n| R2 | 3 |\n| C2 | 4 |\nfooter";
        assert_eq!(rubric_total(text, "R1", "C2"), Ok(12.0));
    }

    #[test]
    fn rubric_total_rejects_blank_fields() {
        let text = "| R1 | 5 |\n| R2 |  |\n| C2 | 4 |";
        let err = rubric_total(text, "R1", "C2").unwrap_err();
        assert!(err.contains("R2"), "error should name the row: {err}");
    }
}
