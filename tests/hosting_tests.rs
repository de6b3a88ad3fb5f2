use std::{collections::BTreeMap, fs};

use anyhow::{Result, bail};
use nbgrade::hosting::{RemoteRepo, RepoHost, fetch_submissions};

/// An in-memory hosting organization for driver tests.
struct FakeHost {
    logins: Vec<String>,
    repos:  Vec<(RemoteRepo, Vec<String>, BTreeMap<String, Vec<u8>>)>,
}

impl RepoHost for FakeHost {
    fn user_logins(&self) -> Result<Vec<String>> {
        Ok(self.logins.clone())
    }

    fn repos(&self, search: &str) -> Result<Vec<RemoteRepo>> {
        Ok(self
            .repos
            .iter()
            .filter(|(repo, _, _)| repo.name.contains(search))
            .map(|(repo, _, _)| RemoteRepo {
                name:     repo.name.clone(),
                html_url: repo.html_url.clone(),
            })
            .collect())
    }

    fn collaborators(&self, repo: &str) -> Result<Vec<String>> {
        for (remote, users, _) in &self.repos {
            if remote.name == repo {
                return Ok(users.clone());
            }
        }
        bail!("unknown repo '{repo}'");
    }

    fn fetch_file(&self, repo: &str, path: &str) -> Result<Vec<u8>> {
        for (remote, _, files) in &self.repos {
            if remote.name == repo {
                return match files.get(path) {
                    Some(content) => Ok(content.clone()),
                    None => bail!("no '{path}' in '{repo}'"),
                };
            }
        }
        bail!("unknown repo '{repo}'");
    }
}

fn repo(name: &str, users: &[&str], files: &[(&str, &str)]) -> (RemoteRepo, Vec<String>, BTreeMap<String, Vec<u8>>) {
    (
        RemoteRepo {
            name:     name.to_string(),
            html_url: format!("https://example.com/{name}"),
        },
        users.iter().map(|u| u.to_string()).collect(),
        files
            .iter()
            .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec()))
            .collect(),
    )
}

#[test]
fn fetch_submissions_writes_files_and_reports_missing_students() {
    let host = FakeHost {
        logins: ["prof", "ana", "ben", "cara"].map(String::from).to_vec(),
        repos:  vec![
            // Template repo with only the instructor on it.
            repo("hw5-template", &["prof"], &[("hw5.ipynb", "{}")]),
            // A normal submission.
            repo("hw5-ana", &["ana", "prof"], &[("hw5.ipynb", "{\"cells\": []}")]),
            // A pair submission without the expected file.
            repo("hw5-pair", &["ben", "cara"], &[("README.md", "hi")]),
            // A repo for a different assignment.
            repo("hw4-ana", &["ana"], &[("hw4.ipynb", "{}")]),
        ],
    };

    let out = tempfile::tempdir().expect("tempdir");
    let admins = vec!["prof".to_string()];

    let missing =
        fetch_submissions(&host, "hw5", "hw5.ipynb", out.path(), &admins).expect("fetch");

    let ana = fs::read_to_string(out.path().join("ana.ipynb")).expect("ana submission");
    assert_eq!(ana, "{\"cells\": []}");

    // The pair repo had no hw5.ipynb, so ben and cara stay missing.
    assert_eq!(missing, vec!["ben".to_string(), "cara".to_string()]);

    // The admin-only template produced no output file.
    assert!(!out.path().join("prof.ipynb").exists());
}
