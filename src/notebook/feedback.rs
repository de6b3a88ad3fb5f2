//! Grade-cell synthesis and the insertion engine.
//!
//! The insertion engine walks the cell sequence exactly once. For every
//! exercise cell it guarantees the immediately following cell is a grade
//! cell, inserting one when missing. The pass is idempotent: pre-existing
//! grade cells are detected and skipped, so running it twice produces the
//! same sequence as running it once.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use glob::glob;
use typed_builder::TypedBuilder;

use super::{Cell, GradeError, Notebook, exercise::{Classifier, ExerciseId, GRADE_NAME_PREFIX, GRADE_TAG, Strategy}};

/// How an assignment is graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GradingMode {
    /// One grade cell per exercise cell.
    #[default]
    PerExercise,
    /// One holistic rubric table per notebook, prepended at the top.
    Rubric,
}

/// Rubric category labels used when no explicit list is configured.
pub const DEFAULT_RUBRIC_CATEGORIES: [&str; 6] = ["R1", "R2", "F1", "F2", "C1", "C2"];

/// Everything the synthesizer and insertion engine need to know, passed
/// explicitly rather than read from process-wide state.
#[derive(Debug, Clone, TypedBuilder)]
pub struct GradePolicy {
    /// Cell classification strategy, chosen once per run.
    #[builder(default)]
    pub strategy:   Strategy,
    /// Per-exercise grade cells or one rubric table.
    #[builder(default)]
    pub mode:       GradingMode,
    /// Static exercise-id -> points table, consulted when an exercise
    /// header carries no inline point count.
    #[builder(default)]
    pub points:     BTreeMap<String, u32>,
    /// Rubric category labels, in table order.
    #[builder(default = DEFAULT_RUBRIC_CATEGORIES.iter().map(|c| c.to_string()).collect())]
    pub categories: Vec<String>,
}

impl Default for GradePolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GradePolicy {
    /// Resolves the point value for an exercise: inline count first, then
    /// the static table.
    fn resolve_points(&self, id: ExerciseId, inline: Option<u32>) -> Option<u32> {
        inline.or_else(|| self.points.get(&id.to_string()).copied())
    }
}

/// What one insertion pass did to one notebook.
#[derive(Debug, Default)]
pub struct InsertionReport {
    /// Number of grade cells inserted.
    pub inserted: usize,
    /// Per-cell failures that were skipped over.
    pub warnings: Vec<GradeError>,
}

/// Builds the markdown body of a per-exercise grade cell.
fn grade_cell_text(id: ExerciseId, points: u32) -> String {
    format!(
        "<span style=\"color:#F00\">\nExercise {id} Grade<br />\n/{points}\n</span>\n\nNotes:\n"
    )
}

/// Creates a grade cell for one exercise. Under the textual strategy the
/// cell also gets a derived name (`gr` + id) so a later pass can recognize
/// it without re-parsing source text.
fn new_grade_cell(id: ExerciseId, points: u32, strategy: Strategy) -> Cell {
    let mut cell = Cell::markdown(grade_cell_text(id, points));
    cell.add_tag(GRADE_TAG);

    if strategy == Strategy::Textual {
        cell.metadata.name = Some(format!("{GRADE_NAME_PREFIX}{id}"));
    }

    cell
}

/// Creates the single holistic rubric cell: one table row per category,
/// score column left blank for the grader.
fn new_rubric_cell(categories: &[String]) -> Cell {
    let mut text = String::from("### Grading Rubric\n\n| Category | Score |\n| --- | --- |\n");
    for category in categories {
        text.push_str(&format!("| {category} |  |\n"));
    }
    text.push_str("\nNotes:\n");

    let mut cell = Cell::markdown(text);
    cell.add_tag(GRADE_TAG);
    cell
}

/// Ensures every exercise cell is immediately followed by a grade cell
/// (per-exercise mode), or that one rubric cell leads the notebook (rubric
/// mode). Mutates the notebook in place; all failures are per-cell
/// warnings and never abort the pass.
pub fn insert_grade_cells(notebook: &mut Notebook, policy: &GradePolicy, name: &str) -> InsertionReport {
    match policy.mode {
        GradingMode::PerExercise => insert_per_exercise(notebook, policy, name),
        GradingMode::Rubric => insert_rubric(notebook, policy),
    }
}

/// The single forward pass of the per-exercise insertion engine.
fn insert_per_exercise(notebook: &mut Notebook, policy: &GradePolicy, name: &str) -> InsertionReport {
    let classifier = Classifier::new(policy.strategy);
    let mut report = InsertionReport::default();

    let mut i = 0;
    while i < notebook.cells.len() {
        if !classifier.is_exercise(&notebook.cells[i]) {
            i += 1;
            continue;
        }

        // Lookahead: an existing grade cell means the pair is already
        // satisfied. Skip past both so the pass stays idempotent.
        if notebook
            .cells
            .get(i + 1)
            .is_some_and(|next| classifier.is_grade(next))
        {
            i += 2;
            continue;
        }

        let Some(header) = classifier.exercise_header(&notebook.cells[i]) else {
            let warning = GradeError::UnrecognizedExercisePattern {
                notebook: name.to_string(),
                index:    i,
            };
            tracing::warn!("{warning}");
            report.warnings.push(warning);
            i += 1;
            continue;
        };

        let Some(points) = policy.resolve_points(header.id, header.points) else {
            let warning = GradeError::MissingPointsEntry {
                notebook: name.to_string(),
                id:       header.id.to_string(),
            };
            tracing::warn!("{warning}");
            report.warnings.push(warning);
            i += 1;
            continue;
        };

        let cell = new_grade_cell(header.id, points, policy.strategy);
        notebook.cells.insert(i + 1, cell);
        report.inserted += 1;

        // Skip past the exercise cell and the cell just inserted; the new
        // cell is never re-inspected.
        i += 2;
    }

    report
}

/// Prepends the rubric cell once. A notebook whose first cell is already a
/// grade cell is left untouched.
fn insert_rubric(notebook: &mut Notebook, policy: &GradePolicy) -> InsertionReport {
    let classifier = Classifier::new(policy.strategy);
    let mut report = InsertionReport::default();

    let already = notebook
        .cells
        .first()
        .is_some_and(|first| classifier.is_grade(first));

    if !already {
        notebook.cells.insert(0, new_rubric_cell(&policy.categories));
        report.inserted = 1;
    }

    report
}

/// Creates a feedback notebook in a directory that already contains the
/// student's homework notebook. Returns `Ok(None)` (after a warning) when
/// no source notebook is found, so a batch driver can move on.
pub fn init_feedback(
    dir: &Path,
    policy: &GradePolicy,
    source_glob: &str,
    out_name: &str,
) -> Result<Option<InsertionReport>> {
    let pattern = dir.join(source_glob);
    let pattern = pattern
        .to_str()
        .context("Could not convert notebook glob to string")?;

    let mut sources: Vec<_> = glob(pattern)
        .context("Could not create notebook glob")?
        .filter_map(Result::ok)
        .collect();
    sources.sort();

    let Some(source) = sources.first() else {
        tracing::warn!(
            "{}",
            GradeError::MissingSourceNotebook {
                dir:     dir.display().to_string(),
                pattern: source_glob.to_string(),
            }
        );
        return Ok(None);
    };

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string());

    let mut notebook = Notebook::read(source)?;
    let report = insert_grade_cells(&mut notebook, policy, &name);
    notebook.write(&dir.join(out_name))?;

    Ok(Some(report))
}

/// Creates feedback notebooks across a batch of repositories. A repository
/// whose notebook cannot be read or written is reported and skipped; one
/// bad clone never stops the rest of the batch. Returns the number of
/// repositories that got a feedback notebook.
pub fn init_feedback_all(
    repos: &[PathBuf],
    policy: &GradePolicy,
    source_glob: &str,
    out_name: &str,
) -> usize {
    let mut prepared = 0;

    for dir in repos {
        match init_feedback(dir, policy, source_glob, out_name) {
            Ok(Some(_)) => prepared += 1,
            Ok(None) => {}
            Err(error) => tracing::warn!("{error:#}"),
        }
    }

    prepared
}
