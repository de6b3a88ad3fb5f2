//! In-memory notebook document model and nbformat interchange I/O.

/// Classification of exercise and grade cells.
pub mod exercise;
/// Rubric-table score extraction.
pub mod extract;
/// Grade-cell synthesis and insertion.
pub mod feedback;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail, ensure};
use glob::glob;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use self::exercise::Classifier;

/// Suffix instructor solution notebooks carry.
pub const SOLUTIONS_SUFFIX: &str = "-solutions.ipynb";

/// Errors local to a single cell or a single notebook. All of these are
/// recovered by skip-and-report; none of them aborts a batch.
#[derive(thiserror::Error, Debug)]
pub enum GradeError {
    /// No candidate source notebook was found for a target directory.
    #[error("no notebook matching '{pattern}' in '{dir}'")]
    MissingSourceNotebook {
        /// Directory that was searched.
        dir:     String,
        /// Glob pattern that found nothing.
        pattern: String,
    },
    /// A cell looks like an exercise cell but its header is not parseable.
    #[error("cell {index} of '{notebook}' has no recognizable exercise header")]
    UnrecognizedExercisePattern {
        /// Notebook the cell belongs to.
        notebook: String,
        /// Position of the offending cell.
        index:    usize,
    },
    /// No point value could be resolved for an exercise identifier.
    #[error("no points entry for exercise {id} in '{notebook}'")]
    MissingPointsEntry {
        /// Notebook the exercise belongs to.
        notebook: String,
        /// Exercise identifier that failed lookup.
        id:       String,
    },
    /// The notebook cannot be scored at all.
    #[error("'{notebook}' is ungradeable: {reason}")]
    UngradeableNotebook {
        /// Notebook that failed.
        notebook: String,
        /// Why it failed, e.g. which rubric row would not parse.
        reason:   String,
    },
}

/// The kind of a notebook cell. `Raw` never participates in grading but is
/// accepted so real notebooks round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    /// A markdown cell.
    Markdown,
    /// A code cell.
    Code,
    /// A raw cell.
    Raw,
}

/// The slice of cell metadata the grading tools care about. Everything else
/// is carried through `other` untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellMetadata {
    /// Cell tags. A metadata object without a `tags` key means no tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags:  Vec<String>,
    /// Optional cell name, used by the textual strategy to mark grade cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name:  Option<String>,
    /// All remaining metadata, preserved verbatim.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A single notebook cell. Source text is normalized to one `String` on
/// read (the interchange format allows either a string or a list of lines);
/// any fields beyond kind/source/metadata (ids, outputs, execution counts)
/// are carried through `extra` so code cells serialize back intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Whether this is a markdown, code, or raw cell.
    #[serde(rename = "cell_type")]
    pub kind:     CellKind,
    /// The cell's source text.
    #[serde(deserialize_with = "string_or_lines")]
    pub source:   String,
    /// Tags, name, and passthrough metadata.
    #[serde(default)]
    pub metadata: CellMetadata,
    /// Remaining top-level cell fields, preserved verbatim.
    #[serde(flatten)]
    pub extra:    Map<String, Value>,
}

impl Cell {
    /// Creates a new markdown cell with the given source text and a fresh
    /// nbformat 4.5 cell id.
    pub fn markdown(source: impl Into<String>) -> Self {
        let mut extra = Map::new();
        extra.insert(
            "id".to_string(),
            Value::String(uuid::Uuid::new_v4().simple().to_string()),
        );

        Self {
            kind: CellKind::Markdown,
            source: source.into(),
            metadata: CellMetadata::default(),
            extra,
        }
    }

    /// Returns true if the cell carries the given metadata tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.iter().any(|t| t == tag)
    }

    /// Adds a metadata tag if not already present.
    pub fn add_tag(&mut self, tag: &str) {
        if !self.has_tag(tag) {
            self.metadata.tags.push(tag.to_string());
        }
    }
}

/// Accepts both source encodings the interchange format allows: a single
/// string, or a list of line strings that concatenate to the source.
fn string_or_lines<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    /// The two JSON shapes a cell source can take.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Source {
        /// Source as one string.
        Text(String),
        /// Source as a list of lines.
        Lines(Vec<String>),
    }

    Ok(match Source::deserialize(deserializer)? {
        Source::Text(text) => text,
        Source::Lines(lines) => lines.concat(),
    })
}

/// An ordered sequence of cells plus the version markers and notebook-level
/// metadata the interchange format requires. Cell order is significant;
/// the only mutations the grading tools perform are the single-position
/// insertions and the cell-removal passes defined below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    /// The ordered cell sequence.
    pub cells: Vec<Cell>,
    /// Notebook-level metadata, preserved verbatim.
    #[serde(default = "empty_object")]
    pub metadata: Value,
    /// Major version marker.
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    /// Minor version marker.
    #[serde(default = "default_nbformat_minor")]
    pub nbformat_minor: u32,
}

/// Default notebook metadata for notebooks built in memory.
fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Major version written for new notebooks.
fn default_nbformat() -> u32 {
    4
}

/// Minor version written for new notebooks.
fn default_nbformat_minor() -> u32 {
    5
}

impl Notebook {
    /// Creates an empty version-4 notebook.
    pub fn new() -> Self {
        Self {
            cells:          Vec::new(),
            metadata:       empty_object(),
            nbformat:       default_nbformat(),
            nbformat_minor: default_nbformat_minor(),
        }
    }

    /// Reads a notebook from a file.
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read notebook '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Could not parse notebook '{}'", path.display()))
    }

    /// Writes the notebook to a file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Could not serialize notebook")?;
        fs::write(path, text)
            .with_context(|| format!("Could not write notebook '{}'", path.display()))
    }

    /// Removes every cell whose source starts with the solution header.
    /// Returns the number of cells removed.
    pub fn strip_solutions(&mut self, header: &str) -> usize {
        let before = self.cells.len();
        self.cells.retain(|cell| !cell.source.starts_with(header));
        before - self.cells.len()
    }

    /// Removes every cell the classifier recognizes as a grade cell.
    /// Returns the number of cells removed.
    pub fn remove_grade_cells(&mut self, classifier: &Classifier) -> usize {
        let before = self.cells.len();
        self.cells.retain(|cell| !classifier.is_grade(cell));
        before - self.cells.len()
    }
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips solution cells out of an instructor notebook and writes the
/// student-facing copy next to it (`hw1-solutions.ipynb` becomes
/// `hw1.ipynb`). Refuses to overwrite an existing output file. Returns the
/// output path and the number of cells removed.
pub fn strip_notebook(source: &Path, header: &str) -> Result<(PathBuf, usize)> {
    let name = source
        .to_str()
        .context("Could not convert source path to string")?;
    ensure!(
        name.ends_with(SOLUTIONS_SUFFIX),
        "Input path '{name}' doesn't end with '{SOLUTIONS_SUFFIX}'"
    );

    let out = PathBuf::from(format!("{}.ipynb", name.trim_end_matches(SOLUTIONS_SUFFIX)));
    if out.exists() {
        bail!("Output path '{}' already exists", out.display());
    }

    let mut notebook = Notebook::read(source)?;
    let removed = notebook.strip_solutions(header);
    notebook.write(&out)?;

    Ok((out, removed))
}

/// Removes grade cells from every notebook directly under `dir`, in place.
/// A notebook that cannot be read or rewritten is reported and skipped;
/// the rest of the directory is still cleaned. Returns the number of
/// notebooks rewritten.
pub fn clean_notebooks(dir: &Path, classifier: &Classifier) -> Result<usize> {
    let pattern = dir.join("*.ipynb");
    let pattern = pattern
        .to_str()
        .context("Could not convert notebook glob to string")?;

    let mut cleaned = 0;
    for entry in glob(pattern).context("Could not create notebook glob")? {
        let path = match entry {
            Ok(path) => path,
            Err(error) => {
                tracing::warn!("{error:#}");
                continue;
            }
        };

        let result = Notebook::read(&path).and_then(|mut notebook| {
            let removed = notebook.remove_grade_cells(classifier);
            notebook.write(&path)?;
            Ok(removed)
        });

        match result {
            Ok(removed) => {
                tracing::info!("{} ({removed} grade cells removed)", path.display());
                cleaned += 1;
            }
            Err(error) => tracing::warn!("{error:#}"),
        }
    }

    Ok(cleaned)
}
