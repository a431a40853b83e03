//! GitHub Releases REST backend
//!
//! Uses the blocking `reqwest` client; every call runs to completion before
//! the next pipeline action starts.

use crate::archive::sha256_hex;
use crate::domain::{PreRelease, Release, Version};
use crate::error::{RelgateError, Result};
use crate::ledger::ReleaseProvider;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = concat!("relgate/", env!("CARGO_PKG_VERSION"));

/// GitHub caps `per_page` at 100.
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct GhAsset {
    id: u64,
    name: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhRelease {
    id: u64,
    tag_name: String,
    target_commitish: String,
    draft: bool,
    upload_url: String,
    #[serde(default)]
    assets: Vec<GhAsset>,
}

impl GhRelease {
    fn into_release(self) -> Release {
        let pr = Version::parse(&self.tag_name)
            .ok()
            .and_then(|v| PreRelease::parse(v.prerelease()).ok())
            .and_then(|pre| match pre {
                PreRelease::PullRequest { number } => Some(number),
                PreRelease::Local { .. } => None,
            });

        Release {
            id: self.id.to_string(),
            commit_hash: self.target_commitish,
            tag: self.tag_name,
            pr,
            artifacts: self.assets.into_iter().map(|a| a.name).collect(),
            draft: self.draft,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateReleaseBody<'a> {
    tag_name: &'a str,
    target_commitish: &'a str,
    name: &'a str,
    draft: bool,
    prerelease: bool,
}

#[derive(Debug, Serialize, Default)]
struct EditReleaseBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    tag_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_commitish: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    draft: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct GhErrorResponse {
    message: String,
}

/// Release provider backed by the GitHub REST API
pub struct GithubReleaseProvider {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
    token: String,
}

impl GithubReleaseProvider {
    pub fn new(
        api_base: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .build()
            .map_err(|e| RelgateError::release(format!("cannot build HTTP client: {}", e)))?;

        Ok(GithubReleaseProvider {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
        })
    }

    fn headers(&self, accept: &'static str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| RelgateError::release("GITHUB_TOKEN contains invalid characters"))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .headers(self.headers("application/vnd.github+json")?)
            .send()
            .map_err(|e| RelgateError::release(format!("request failed: {}", e)))?;
        check_status(response)
    }

    fn send_json<T: for<'de> Deserialize<'de>>(&self, request: RequestBuilder) -> Result<T> {
        self.send(request)?
            .json()
            .map_err(|e| RelgateError::release(format!("cannot parse response: {}", e)))
    }

    fn list_raw(&self, limit: usize) -> Result<Vec<GhRelease>> {
        let mut releases = Vec::new();
        let mut page = 1;

        while releases.len() < limit {
            let per_page = (limit - releases.len()).min(MAX_PAGE_SIZE);
            let url = self.repo_url(&format!("releases?per_page={}&page={}", per_page, page));
            let batch: Vec<GhRelease> = self.send_json(self.client.get(url))?;
            let done = batch.len() < per_page;
            releases.extend(batch);
            if done {
                break;
            }
            page += 1;
        }

        releases.truncate(limit);
        Ok(releases)
    }

    /// Published releases resolve through the tag endpoint; drafts only show up in the listing
    fn find_raw(&self, tag: &str) -> Result<GhRelease> {
        let url = self.repo_url(&format!("releases/tags/{}", tag));
        match self.send_json::<GhRelease>(self.client.get(url)) {
            Ok(release) => Ok(release),
            Err(RelgateError::ReleaseNotFound(_)) => self
                .list_raw(MAX_PAGE_SIZE)?
                .into_iter()
                .find(|r| r.tag_name == tag)
                .ok_or_else(|| RelgateError::release_not_found(tag)),
            Err(e) => Err(e),
        }
    }

    fn edit(&self, id: &str, body: &EditReleaseBody<'_>) -> Result<Release> {
        let url = self.repo_url(&format!("releases/{}", id));
        let release: GhRelease = self.send_json(self.client.patch(url).json(body))?;
        Ok(release.into_release())
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let message = response
        .json::<GhErrorResponse>()
        .map(|e| e.message)
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(match status {
        StatusCode::NOT_FOUND => RelgateError::release_not_found(url),
        StatusCode::UNAUTHORIZED => RelgateError::release("invalid or expired token"),
        _ => RelgateError::release(format!("{} from {}: {}", status.as_u16(), url, message)),
    })
}

/// `https://uploads.github.com/.../assets{?name,label}` -> `.../assets`
fn upload_base(upload_url: &str) -> &str {
    upload_url.split('{').next().unwrap_or(upload_url)
}

impl ReleaseProvider for GithubReleaseProvider {
    fn create_release(&self, tag: &str, commit: &str) -> Result<Release> {
        let prerelease = Version::parse(tag).map(|v| v.is_prerelease()).unwrap_or(false);
        let body = CreateReleaseBody {
            tag_name: tag,
            target_commitish: commit,
            name: tag,
            draft: true,
            prerelease,
        };

        let release: GhRelease =
            self.send_json(self.client.post(self.repo_url("releases")).json(&body))?;
        info!(tag, id = release.id, "created draft release");
        Ok(release.into_release())
    }

    fn tag_release(&self, release: &Release, version: &Version, commit: &str) -> Result<Release> {
        let tag = version.to_tag(false);
        self.edit(
            &release.id,
            &EditReleaseBody {
                tag_name: Some(&tag),
                target_commitish: Some(commit),
                name: Some(&tag),
                ..Default::default()
            },
        )
    }

    fn get_release_by_tag(&self, tag: &str) -> Result<Release> {
        Ok(self.find_raw(tag)?.into_release())
    }

    fn list_recent_releases(&self, limit: usize) -> Result<Vec<Release>> {
        Ok(self
            .list_raw(limit)?
            .into_iter()
            .map(GhRelease::into_release)
            .collect())
    }

    /// The asset label carries the content hash; a matching label skips the upload
    fn upload_release_artifact(&self, release: &Release, name: &str, path: &Path) -> Result<()> {
        let digest = sha256_hex(path)?;
        let raw = self.find_raw(&release.tag)?;

        for asset in raw.assets.iter().filter(|a| a.name == name) {
            if asset.label.as_deref() == Some(digest.as_str()) {
                debug!(name, "asset unchanged, skipping upload");
                return Ok(());
            }
            info!(name, local = %digest, remote = ?asset.label, "asset changed, replacing");
            let url = self.repo_url(&format!("releases/assets/{}", asset.id));
            self.send(self.client.delete(url))?;
        }

        let content = fs::read(path)?;
        let request = self
            .client
            .post(upload_base(&raw.upload_url))
            .query(&[("name", name), ("label", digest.as_str())])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content);
        self.send(request)?;

        info!(name, tag = %release.tag, "uploaded asset");
        Ok(())
    }

    fn download_release_artifact(
        &self,
        release: &Release,
        name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let raw = self.find_raw(&release.tag)?;
        let asset = raw
            .assets
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| {
                RelgateError::release_not_found(format!("{} on {}", name, release.tag))
            })?;

        let url = self.repo_url(&format!("releases/assets/{}", asset.id));
        let response = self
            .client
            .get(url)
            .headers(self.headers("application/octet-stream")?)
            .send()
            .map_err(|e| RelgateError::release(format!("request failed: {}", e)))?;
        let bytes = check_status(response)?
            .bytes()
            .map_err(|e| RelgateError::release(format!("download of '{}' failed: {}", name, e)))?;

        let path = dest_dir.join(name);
        fs::write(&path, &bytes)?;
        debug!(name, path = %path.display(), "downloaded asset");
        Ok(path)
    }

    fn publish_release(&self, release: &Release) -> Result<Release> {
        self.edit(
            &release.id,
            &EditReleaseBody {
                draft: Some(false),
                ..Default::default()
            },
        )
    }
}
