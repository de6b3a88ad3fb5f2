//! Recognition of exercise and grade cells.
//!
//! Two strategies exist because the course's notebooks changed over time.
//! Newer assignment notebooks tag cells explicitly in metadata (the
//! structural strategy); older ones can only be recognized by matching the
//! `__Exercise 2.1 (20 points).__` header in the cell source (the textual
//! strategy). The strategy is chosen once per run; there is no fallback
//! chain inside a scan.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Cell, CellKind};

/// Metadata tag marking an exercise cell.
pub const EXERCISE_TAG: &str = "exercise";

/// Metadata tag marking a grade cell.
pub const GRADE_TAG: &str = "grade";

/// Prefix of the derived cell name given to grade cells under the textual
/// strategy, so a second pass can recognize them without re-parsing source.
pub const GRADE_NAME_PREFIX: &str = "gr";

lazy_static! {
    /// Matches `__Exercise 2.1 (20 points).__` and the bare
    /// `__Exercise 2.1.__` form. The points group is absent in the latter.
    static ref EXERCISE_PATTERN: Regex =
        Regex::new(r"__Exercise ([0-9]+)\.([0-9]{1,3})(?: \(([0-9]+) points\))?\.?__")
            .expect("exercise pattern is valid");
}

/// How cells are classified as exercise or grade cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Classify by explicit metadata tags. Unambiguous; the default.
    #[default]
    Structural,
    /// Classify by matching the cell's source text. Legacy fallback;
    /// fragile against multi-paragraph cells.
    Textual,
}

/// A two-part exercise identifier, e.g. `2.1`. Globally unique within a
/// notebook; joins an exercise cell to its grade cell and keys the static
/// points table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExerciseId {
    /// The part before the dot.
    pub major: u32,
    /// The part after the dot.
    pub minor: u32,
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ExerciseId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| anyhow!("'{s}' is not a major.minor exercise id"))?;
        Ok(Self {
            major: major.parse()?,
            minor: minor.parse()?,
        })
    }
}

/// The parsed form of an exercise cell's header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExerciseHeader {
    /// The exercise identifier.
    pub id:     ExerciseId,
    /// The inline point count, when the header carries one.
    pub points: Option<u32>,
}

/// Parses an exercise header out of cell source text, if one is present.
pub fn parse_exercise_header(source: &str) -> Option<ExerciseHeader> {
    let captures = EXERCISE_PATTERN.captures(source)?;

    let major = captures[1].parse().ok()?;
    let minor = captures[2].parse().ok()?;
    let points = captures.get(3).and_then(|m| m.as_str().parse().ok());

    Some(ExerciseHeader {
        id: ExerciseId { major, minor },
        points,
    })
}

/// Classifies cells under one strategy chosen at configuration time.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    /// The configured strategy.
    strategy: Strategy,
}

impl Classifier {
    /// Creates a classifier for the given strategy.
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    /// Returns the configured strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Is this an exercise cell? Under the textual strategy any markdown
    /// cell opening with `__Exercise` counts, even if the full header turns
    /// out to be malformed; the insertion engine reports those separately.
    pub fn is_exercise(&self, cell: &Cell) -> bool {
        match self.strategy {
            Strategy::Structural => cell.has_tag(EXERCISE_TAG),
            Strategy::Textual => {
                cell.kind == CellKind::Markdown && cell.source.starts_with("__Exercise")
            }
        }
    }

    /// Is this a grade cell? The textual strategy also accepts the `grade`
    /// tag, since cells this tool synthesizes always carry it. A derived
    /// name only counts when it is `gr` plus a full exercise id, so a
    /// student cell named `graphs` is never mistaken for one.
    pub fn is_grade(&self, cell: &Cell) -> bool {
        match self.strategy {
            Strategy::Structural => cell.has_tag(GRADE_TAG),
            Strategy::Textual => {
                cell.has_tag(GRADE_TAG)
                    || cell
                        .metadata
                        .name
                        .as_deref()
                        .and_then(|name| name.strip_prefix(GRADE_NAME_PREFIX))
                        .is_some_and(|id| id.parse::<ExerciseId>().is_ok())
            }
        }
    }

    /// Extracts the exercise header from an exercise cell's source.
    pub fn exercise_header(&self, cell: &Cell) -> Option<ExerciseHeader> {
        parse_exercise_header(&cell.source)
    }
}
