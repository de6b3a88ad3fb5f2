use std::{fs, path::PathBuf};

use nbgrade::notebook::{
    Notebook,
    exercise::{Classifier, Strategy},
    feedback::{GradePolicy, init_feedback, init_feedback_all},
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn init_feedback_writes_a_graded_copy_next_to_the_homework() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::copy(fixture("hw1.ipynb"), dir.path().join("hw1.ipynb")).expect("copy fixture");

    let policy = GradePolicy::default();
    let report = init_feedback(dir.path(), &policy, "hw*.ipynb", "feedback.ipynb")
        .expect("init feedback")
        .expect("source notebook found");

    assert_eq!(report.inserted, 1);

    let feedback = Notebook::read(&dir.path().join("feedback.ipynb")).expect("read feedback");
    let classifier = Classifier::new(Strategy::Structural);

    // One more cell than the source: the grade cell after the exercise.
    assert_eq!(feedback.cells.len(), 5);
    assert!(classifier.is_exercise(&feedback.cells[1]));
    assert!(classifier.is_grade(&feedback.cells[2]));
    assert!(feedback.cells[2].source.contains("/20"));

    // The source notebook is untouched.
    let source = Notebook::read(&dir.path().join("hw1.ipynb")).expect("read source");
    assert_eq!(source.cells.len(), 4);
}

#[test]
fn init_feedback_skips_directories_without_a_notebook() {
    let dir = tempfile::tempdir().expect("tempdir");

    let report = init_feedback(dir.path(), &GradePolicy::default(), "hw*.ipynb", "feedback.ipynb")
        .expect("missing notebook is not an error");

    assert!(report.is_none());
    assert!(!dir.path().join("feedback.ipynb").exists());
}

#[test]
fn one_unparseable_notebook_never_stops_the_batch() {
    let dir = tempfile::tempdir().expect("tempdir");

    // "broken" sorts before "fine", so the batch must survive it.
    let broken = dir.path().join("broken");
    fs::create_dir(&broken).expect("mkdir");
    fs::write(broken.join("hw1.ipynb"), "{ not valid json").expect("write notebook");

    let fine = dir.path().join("fine");
    fs::create_dir(&fine).expect("mkdir");
    fs::copy(fixture("hw1.ipynb"), fine.join("hw1.ipynb")).expect("copy fixture");

    let repos = vec![broken.clone(), fine.clone()];
    let prepared =
        init_feedback_all(&repos, &GradePolicy::default(), "hw*.ipynb", "feedback.ipynb");

    assert_eq!(prepared, 1);
    assert!(fine.join("feedback.ipynb").exists());
    assert!(!broken.join("feedback.ipynb").exists());
}
