//! Remote hosting access for submission collection.
//!
//! The hosting API is behind the `RepoHost` trait so drivers depend on a
//! small capability (list people, list repositories, fetch one file)
//! rather than on a particular vendor client. `GitHubHost` implements it
//! over the GitHub REST API, including the outside-collaborators listing
//! that student accounts usually fall under.

use std::{collections::BTreeSet, fs, path::Path};

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde::Deserialize;

/// A repository in the hosting organization.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRepo {
    /// Repository name within the organization.
    pub name:     String,
    /// Browser URL, used in progress messages.
    pub html_url: String,
}

/// A user login returned by people-listing endpoints.
#[derive(Debug, Clone, Deserialize)]
struct Login {
    /// The username.
    login: String,
}

/// The capability the submission-collection drivers need from a hosting
/// provider.
pub trait RepoHost {
    /// All user logins associated with the organization, members and
    /// outside collaborators alike, sorted.
    fn user_logins(&self) -> Result<Vec<String>>;

    /// Organization repositories whose name contains the search term.
    fn repos(&self, search: &str) -> Result<Vec<RemoteRepo>>;

    /// Logins of a repository's collaborators.
    fn collaborators(&self, repo: &str) -> Result<Vec<String>>;

    /// Raw bytes of one file in a repository.
    fn fetch_file(&self, repo: &str, path: &str) -> Result<Vec<u8>>;
}

/// `RepoHost` over the GitHub REST API.
pub struct GitHubHost {
    /// Shared blocking HTTP client.
    client: Client,
    /// Personal access token.
    token:  String,
    /// Organization the course lives in.
    org:    String,
}

impl GitHubHost {
    /// Creates a client for one organization with a personal access token.
    pub fn new(org: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("nbgrade")
            .build()
            .context("Could not build HTTP client")?;

        Ok(Self {
            client,
            token: token.into(),
            org: org.into(),
        })
    }

    /// Fetches every page of a list endpoint and deserializes the
    /// concatenation.
    fn get_paged<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<Vec<T>> {
        let mut results = Vec::new();

        for page in 1u32.. {
            let page = page.to_string();
            let response = self
                .client
                .get(url)
                .query(&[("per_page", "100"), ("page", page.as_str())])
                .bearer_auth(&self.token)
                .header("Accept", "application/vnd.github+json")
                .send()
                .with_context(|| format!("Request to {url} failed"))?;

            if !response.status().is_success() {
                bail!("{url} returned {}", response.status());
            }

            let batch: Vec<T> = response
                .json()
                .with_context(|| format!("Could not parse response from {url}"))?;
            let done = batch.len() < 100;
            results.extend(batch);

            if done {
                break;
            }
        }

        Ok(results)
    }

    /// Base URL for the organization's endpoints.
    fn org_url(&self, tail: &str) -> String {
        format!("https://api.github.com/orgs/{}/{tail}", self.org)
    }
}

impl RepoHost for GitHubHost {
    fn user_logins(&self) -> Result<Vec<String>> {
        let members: Vec<Login> = self.get_paged(&self.org_url("members"))?;
        let outside: Vec<Login> = self.get_paged(&self.org_url("outside_collaborators"))?;

        let mut logins: Vec<String> = members
            .into_iter()
            .chain(outside)
            .map(|user| user.login)
            .collect();
        logins.sort();
        logins.dedup();
        Ok(logins)
    }

    fn repos(&self, search: &str) -> Result<Vec<RemoteRepo>> {
        let repos: Vec<RemoteRepo> = self.get_paged(&self.org_url("repos"))?;
        Ok(repos
            .into_iter()
            .filter(|repo| repo.name.contains(search))
            .collect())
    }

    fn collaborators(&self, repo: &str) -> Result<Vec<String>> {
        let url = format!(
            "https://api.github.com/repos/{}/{repo}/collaborators",
            self.org
        );
        let users: Vec<Login> = self.get_paged(&url)?;
        Ok(users.into_iter().map(|user| user.login).collect())
    }

    fn fetch_file(&self, repo: &str, path: &str) -> Result<Vec<u8>> {
        let url = format!(
            "https://api.github.com/repos/{}/{repo}/contents/{path}",
            self.org
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.raw+json")
            .send()
            .with_context(|| format!("Request to {url} failed"))?;

        if !response.status().is_success() {
            bail!("{url} returned {}", response.status());
        }

        Ok(response.bytes()?.to_vec())
    }
}

/// Fetches one file from every matching repository in the organization and
/// writes it to `<collaborators joined by _>.ipynb` under `out_dir`.
/// Returns the logins of students for whom no submission was found.
pub fn fetch_submissions(
    host: &dyn RepoHost,
    search: &str,
    file: &str,
    out_dir: &Path,
    admins: &[String],
) -> Result<Vec<String>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Could not create '{}'", out_dir.display()))?;

    let mut remaining: BTreeSet<String> = host
        .user_logins()?
        .into_iter()
        .filter(|login| !admins.contains(login))
        .collect();

    for repo in host.repos(search)? {
        let users: Vec<String> = host
            .collaborators(&repo.name)?
            .into_iter()
            .filter(|login| !admins.contains(login))
            .collect();

        // Admin-only repos (templates, solutions) are not submissions.
        if users.is_empty() {
            continue;
        }

        let content = match host.fetch_file(&repo.name, file) {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!("No '{file}' ({}): {error:#}", repo.html_url);
                continue;
            }
        };

        for user in &users {
            remaining.remove(user);
        }

        let name = format!("{}.ipynb", users.join("_"));
        fs::write(out_dir.join(&name), content)
            .with_context(|| format!("Could not write '{name}'"))?;
        tracing::info!("{name} ({})", repo.html_url);
    }

    Ok(remaining.into_iter().collect())
}
