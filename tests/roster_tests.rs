use std::{collections::BTreeMap, fs, path::Path};

use nbgrade::roster::{
    email_local, merge_students, read_canvas, read_github, read_photo_roster, read_piazza,
    read_students, write_canvas, write_students,
};

fn write(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write test csv");
}

fn no_ignore() -> Vec<String> {
    Vec::new()
}

#[test]
fn email_local_part_is_the_repo_directory_name() {
    assert_eq!(email_local("amaral@example.edu"), "amaral");
    assert_eq!(email_local("not-an-email"), "not-an-email");
}

#[test]
fn photo_roster_skips_the_banner_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("roster.csv");

    let mut contents = String::new();
    for i in 0..8 {
        contents.push_str(&format!("banner line {i},,,,,,,\n"));
    }
    contents.push_str("id,last,first,status,section,email,level,class\n");
    contents.push_str("912345678,Amaral,Ana,Enrolled,A01,amaral@example.edu,SR,STA141B\n");
    write(&path, &contents);

    let rows = read_photo_roster(&path, &no_ignore()).expect("read roster");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "912345678");
    assert_eq!(rows[0].last_name, "Amaral");
    assert_eq!(rows[0].email, "amaral@example.edu");
}

#[test]
fn staff_emails_are_filtered_everywhere() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("classroom.csv");
    write(
        &path,
        "identifier,github_username,github_id,name\n\
         amaral@example.edu,ana-a,1001,Ana Amaral\n\
         ta@example.edu,the-ta,1002,The TA\n",
    );

    let ignore = vec!["ta@example.edu".to_string()];
    let rows = read_github(&path, &ignore).expect("read roster");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].github, "ana-a");
}

#[test]
fn merge_joins_canvas_roster_piazza_and_github() {
    let dir = tempfile::tempdir().expect("tempdir");

    let canvas_path = dir.path().join("canvas.csv");
    write(
        &canvas_path,
        "Student,ID,SIS User ID,SIS Login ID,Section,Assignments\n\
         \"Amaral, Ana\",10,912345678,amaral,A01,0\n\
         \"Burke, Ben\",11,923456789,burke,A01,0\n\
         Test Student,12,,,A01,0\n",
    );

    let roster_path = dir.path().join("roster.csv");
    let mut roster = String::new();
    for i in 0..8 {
        roster.push_str(&format!("banner {i},,,,,,,\n"));
    }
    roster.push_str("id,last,first,status,section,email,level,class\n");
    roster.push_str("912345678,Amaral,Ana,Enrolled,A01,amaral@example.edu,SR,STA141B\n");
    roster.push_str("923456789,Burke,Ben,Enrolled,A01,burke@example.edu,JR,STA141B\n");
    write(&roster_path, &roster);

    let piazza_path = dir.path().join("piazza.csv");
    write(
        &piazza_path,
        "name,email,days online\n\
         Ana Amaral,amaral@example.edu,12\n",
    );

    let github_path = dir.path().join("classroom.csv");
    write(
        &github_path,
        "identifier,github_username,github_id,name\n\
         amaral@example.edu,ana-a,1001,Ana Amaral\n",
    );

    let students = merge_students(
        &read_canvas(&canvas_path).expect("canvas"),
        &read_photo_roster(&roster_path, &no_ignore()).expect("roster"),
        &read_piazza(&piazza_path, &no_ignore()).expect("piazza"),
        &read_github(&github_path, &no_ignore()).expect("github"),
    );

    // The test student has no SIS id and is dropped.
    assert_eq!(students.len(), 2);
    assert_eq!(students[0].email, "amaral@example.edu");
    assert_eq!(students[0].github, "ana-a");
    // Ben matched the roster but has no GitHub username.
    assert_eq!(students[1].email, "burke@example.edu");
    assert_eq!(students[1].github, "");
}

#[test]
fn students_file_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let canvas_path = dir.path().join("canvas.csv");
    write(
        &canvas_path,
        "Student,ID,SIS User ID,SIS Login ID,Section\n\
         \"Amaral, Ana\",10,912345678,amaral,A01\n",
    );
    let roster_path = dir.path().join("roster.csv");
    let mut roster = String::new();
    for i in 0..8 {
        roster.push_str(&format!("banner {i},,,,,,,\n"));
    }
    roster.push_str("id,last,first,status,section,email,level,class\n");
    roster.push_str("912345678,Amaral,Ana,Enrolled,A01,amaral@example.edu,SR,STA141B\n");
    write(&roster_path, &roster);

    let students = merge_students(
        &read_canvas(&canvas_path).expect("canvas"),
        &read_photo_roster(&roster_path, &no_ignore()).expect("roster"),
        &[],
        &[],
    );

    let out = dir.path().join("students.csv");
    write_students(&out, &students).expect("write students");
    let again = read_students(&out).expect("read students");

    assert_eq!(again.len(), 1);
    assert_eq!(again[0].student, "Amaral, Ana");
    assert_eq!(again[0].sis_user_id, "912345678");
    assert_eq!(again[0].email, "amaral@example.edu");
}

#[test]
fn canvas_import_leaves_ungradeable_scores_blank() {
    let dir = tempfile::tempdir().expect("tempdir");
    let canvas_path = dir.path().join("canvas.csv");
    write(
        &canvas_path,
        "Student,ID,SIS User ID,SIS Login ID,Section\n\
         \"Amaral, Ana\",10,912345678,amaral,A01\n\
         \"Burke, Ben\",11,923456789,burke,A01\n",
    );
    let roster_path = dir.path().join("roster.csv");
    let mut roster = String::new();
    for i in 0..8 {
        roster.push_str(&format!("banner {i},,,,,,,\n"));
    }
    roster.push_str("id,last,first,status,section,email,level,class\n");
    roster.push_str("912345678,Amaral,Ana,Enrolled,A01,amaral@example.edu,SR,STA141B\n");
    roster.push_str("923456789,Burke,Ben,Enrolled,A01,burke@example.edu,JR,STA141B\n");
    write(&roster_path, &roster);

    let students = merge_students(
        &read_canvas(&canvas_path).expect("canvas"),
        &read_photo_roster(&roster_path, &no_ignore()).expect("roster"),
        &[],
        &[],
    );

    let scores = BTreeMap::from([
        ("amaral".to_string(), Some(15.0)),
        ("burke".to_string(), None),
    ]);

    let out = dir.path().join("gradebook.csv");
    write_canvas(&out, &students, &scores, "hw2").expect("write gradebook");

    let text = fs::read_to_string(&out).expect("read gradebook");
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("Student,ID,SIS User ID,SIS Login ID,Section,hw2")
    );
    assert_eq!(lines.next(), Some("\"Amaral, Ana\",10,912345678,amaral,A01,15"));
    assert_eq!(lines.next(), Some("\"Burke, Ben\",11,923456789,burke,A01,"));
}
