//! # nbgrade
//!
//! Instructor tools for a course that collects homework as Jupyter
//! notebooks in per-student git repositories: merge rosters into one
//! student table, clone every submission, insert grading cells into
//! notebooks, and read the filled-in grades back out into a
//! gradebook-import file.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Course-level configuration loaded from a JSON file.
pub mod config;
/// Remote hosting access for collecting submissions.
pub mod hosting;
/// The notebook document model, grade-cell insertion, and extraction.
pub mod notebook;
/// Summary tables and score output.
pub mod report;
/// Git operations over collections of student repositories.
pub mod repo;
/// Roster readers and the merge-by-email pipeline.
pub mod roster;
