//! End-of-batch reporting: the grade summary table and score CSV output.

use std::{collections::BTreeMap, fmt::Display, path::Path};

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};

use crate::notebook::extract::GradeRecord;

/// A score column entry: a number, or the ungradeable marker.
struct Score(Option<f64>);

impl Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(score) => write!(f, "{score}"),
            None => write!(f, "ungradeable"),
        }
    }
}

/// One row of the grade summary table.
#[derive(Tabled)]
struct SummaryRow {
    /// Student identifier.
    #[tabled(rename = "Student")]
    student: String,
    /// Extracted score or the ungradeable marker.
    #[tabled(rename = "Score")]
    score:   Score,
}

/// Renders the grade summary table for a batch of records.
pub fn summary_table(records: &[GradeRecord]) -> String {
    let rows = records.iter().map(|record| SummaryRow {
        student: record.student.clone(),
        score:   Score(record.score),
    });

    Table::new(rows)
        .with(Panel::header("Grading Summary"))
        .with(Modify::new(Rows::new(1..)).with(Width::wrap(24).keep_words(true)))
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .with(Style::modern())
        .to_string()
}

/// Prints the summary table, then enumerates the ungradeable notebooks
/// for manual follow-up.
pub fn print_summary(records: &[GradeRecord]) {
    println!("{}", summary_table(records));

    let ungradeable: Vec<&str> = records
        .iter()
        .filter(|record| record.score.is_none())
        .map(|record| record.student.as_str())
        .collect();

    if ungradeable.is_empty() {
        println!("{}", "All notebooks graded.".green());
    } else {
        println!(
            "{} {}",
            "Needs manual grading:".red().bold(),
            ungradeable.join(", ")
        );
    }
}

/// Writes a two-column (student, score) CSV; null scores stay blank.
pub fn write_scores_csv(path: &Path, records: &[GradeRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Could not write scores file '{}'", path.display()))?;

    writer.write_record(["student", "score"])?;
    for record in records {
        let score = record.score.map(|s| s.to_string()).unwrap_or_default();
        writer.write_record([record.student.as_str(), score.as_str()])?;
    }

    writer.flush()?;
    Ok(())
}

/// Indexes records by student identifier for joining against a roster.
pub fn scores_by_student(records: &[GradeRecord]) -> BTreeMap<String, Option<f64>> {
    records
        .iter()
        .map(|record| (record.student.clone(), record.score))
        .collect()
}
