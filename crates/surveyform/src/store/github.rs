//! Answer table stored in a GitHub repository through the contents API.
//!
//! `GET /repos/{owner}/{repo}/contents/{path}` returns the file as base64 with
//! its blob `sha`; `PUT` on the same URL replaces it. The `sha` is the revision
//! token: GitHub answers 409 when it is stale and 422 ("\"sha\" wasn't
//! supplied") when it is omitted for a file that already exists. Any other 422
//! is a plain rejection.

use async_trait::async_trait;
use base64::Engine as _;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{RemoteStore, Revision, Snapshot};
use crate::config::{Config, Credential};
use crate::error::{Error, Result};
use crate::submission::format_timestamp;
use crate::table::AnswerTable;

const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";
const MEDIA_TYPE: &str = "application/vnd.github+json";

/// File metadata returned by `GET contents`.
#[derive(Debug, Deserialize)]
struct ContentsFile {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// Body of `PUT contents`.
#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutResponseContent,
}

#[derive(Debug, Deserialize)]
struct PutResponseContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

/// Client for one CSV file on one branch of one repository.
#[derive(Debug, Clone)]
pub struct GitHubStore {
    client: Client,
    contents_url: Url,
    repository: String,
    branch: String,
    path: String,
    token: Credential,
    commit_message: String,
}

impl GitHubStore {
    /// Build a store from the `[store]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if the repository, token, path or
    /// API URL are missing or malformed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = &config.store;

        let (owner, name) = store
            .repository
            .split_once('/')
            .filter(|(owner, name)| {
                !owner.is_empty() && !name.is_empty() && !name.contains('/')
            })
            .ok_or_else(|| {
                Error::config_validation(format!(
                    "store.repository must be \"owner/name\", got {:?}",
                    store.repository
                ))
            })?;

        if store.token.is_empty() {
            return Err(Error::config_validation(
                "store.token is required for the github backend (or set GITHUB_TOKEN)",
            ));
        }

        let contents_url = contents_url(&store.api_url, owner, name, &store.path)?;
        let client = Client::builder()
            .user_agent(concat!("surveyform/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            contents_url,
            repository: store.repository.clone(),
            branch: store.branch.clone(),
            path: store.path.clone(),
            token: store.token.clone(),
            commit_message: store.commit_message.clone(),
        })
    }

    /// The contents API URL of the table file.
    #[must_use]
    pub fn contents_url(&self) -> &Url {
        &self.contents_url
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.token.expose()))
            .map_err(|_| Error::config_validation("store.token contains invalid characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(MEDIA_TYPE));
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn render_commit_message(&self) -> String {
        self.commit_message
            .replace("{timestamp}", &format_timestamp(Utc::now()))
    }
}

fn contents_url(api_url: &str, owner: &str, name: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(api_url)
        .map_err(|e| Error::config_validation(format!("invalid store.api_url {api_url:?}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| Error::config_validation(format!("store.api_url {api_url:?} cannot be a base")))?
        .pop_if_empty()
        .extend(["repos", owner, name, "contents"])
        .extend(path.split('/').filter(|segment| !segment.is_empty()));
    Ok(url)
}

fn decode_content(encoded: &str) -> Result<String> {
    // The API wraps base64 at 60 columns.
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
    Ok(String::from_utf8(bytes)?)
}

/// GitHub's `message` from an error body, or the status reason phrase.
async fn api_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ApiMessage>(&body)
        .map(|m| m.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unexpected status").to_string())
}

/// Turn a non-success response into a store error, keeping GitHub's message.
async fn remote_failure(response: Response) -> Error {
    let status = response.status();
    Error::remote_store(Some(status.as_u16()), api_message(response).await)
}

/// Whether a 422 complains that the file exists but no `sha` was sent.
fn is_missing_sha(message: &str) -> bool {
    message.contains("\"sha\" wasn't supplied")
}

#[async_trait]
impl RemoteStore for GitHubStore {
    fn name(&self) -> &'static str {
        "github"
    }

    fn location(&self) -> String {
        format!("{}@{}:{}", self.repository, self.branch, self.path)
    }

    #[instrument(name = "github_fetch", skip(self), fields(repo = %self.repository, path = %self.path))]
    async fn fetch(&self) -> Result<Snapshot> {
        let response = self
            .client
            .get(self.contents_url.clone())
            .query(&[("ref", self.branch.as_str())])
            .headers(self.headers()?)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            info!("Answer file does not exist yet, starting from an empty table");
            return Ok(Snapshot::default());
        }
        if !status.is_success() {
            let err = remote_failure(response).await;
            warn!(status = status.as_u16(), "Fetching answer file failed");
            return Err(err);
        }

        let file: ContentsFile = response.json().await?;
        if file.encoding.as_deref().is_some_and(|e| e != "base64") {
            return Err(Error::remote_store(
                Some(status.as_u16()),
                format!(
                    "file is served with {:?} encoding; it is too large for the contents API",
                    file.encoding.unwrap_or_default()
                ),
            ));
        }

        let table = AnswerTable::from_csv(&decode_content(&file.content)?)?;
        debug!(rows = table.len(), sha = %file.sha, "Fetched answer file");
        Ok(Snapshot {
            table,
            revision: Some(Revision::new(file.sha)),
        })
    }

    #[instrument(
        name = "github_commit",
        skip(self, table),
        fields(repo = %self.repository, path = %self.path, rows = table.len())
    )]
    async fn commit(&self, table: &AnswerTable, revision: Option<&Revision>) -> Result<Revision> {
        let body = PutContents {
            message: self.render_commit_message(),
            content: base64::engine::general_purpose::STANDARD.encode(table.to_csv()?),
            sha: revision.map(Revision::as_str),
            branch: &self.branch,
        };

        let response = self
            .client
            .put(self.contents_url.clone())
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let created: PutResponse = response.json().await?;
                debug!(sha = %created.content.sha, "Committed answer file");
                Ok(Revision::new(created.content.sha))
            }
            StatusCode::CONFLICT => Err(Error::conflict(&self.path)),
            StatusCode::UNPROCESSABLE_ENTITY if revision.is_none() => {
                let message = api_message(response).await;
                if is_missing_sha(&message) {
                    debug!("File appeared after it was fetched as missing");
                    Err(Error::conflict(&self.path))
                } else {
                    warn!(status = 422, "Writing answer file failed");
                    Err(Error::remote_store(Some(422), message))
                }
            }
            status => {
                let err = remote_failure(response).await;
                warn!(status = status.as_u16(), "Writing answer file failed");
                Err(err)
            }
        }
    }
}
