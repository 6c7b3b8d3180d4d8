// API client module: a small blocking HTTP client that talks to a
// repository contents API (GitHub's `/repos/{owner}/{repo}/contents`).
// Requests are made one at a time, which keeps each probe and its
// write next to each other.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::Credentials;
use crate::error::StoreError;
use crate::store::{ContentStore, RemoteState, VersionToken, WriteRequest};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
const GITHUB_JSON: &str = "application/vnd.github.v3+json";

/// Blocking contents API client. Holds the reqwest client and the
/// credential bundle it was built from.
pub struct ApiClient {
    client: Client,
    credentials: Credentials,
}

/// The part of a contents-API object we care about.
#[derive(Deserialize, Debug)]
struct ContentMetadata {
    sha: String,
}

/// Response of a successful PUT: the written object plus commit info.
#[derive(Deserialize, Debug)]
struct PutResponse {
    content: ContentMetadata,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: String,
}

impl ApiClient {
    /// Build a client for `credentials`. The credentials are expected to
    /// have passed [`Credentials::validate`].
    pub fn new(credentials: Credentials) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_JSON));
        let client = Client::builder()
            .user_agent(concat!("asset-publish/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            credentials,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// `{api_base}/repos/{owner}/{repo}/contents/{path}` with every path
    /// segment percent-encoded, so `#`, `?` and `%` in file names stay part
    /// of the object key.
    fn contents_url(&self, path: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.credentials.api_base)
            .map_err(|e| StoreError::Transport(format!("invalid API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Transport("API base cannot carry a path".into()))?
            .pop_if_empty()
            .extend([
                "repos",
                self.credentials.owner.as_str(),
                self.credentials.repo.as_str(),
                "contents",
            ])
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}

/// Turn a non-success response into a classified error. The body is
/// expected to be `{"message": ...}`; anything else is passed through raw.
fn failure(res: Response) -> StoreError {
    let status = res.status().as_u16();
    let exhausted = res
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false);
    let txt = res.text().unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&txt) {
        Ok(body) => body.message,
        Err(_) if txt.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => txt,
    };
    StoreError::from_status(status, message, exhausted)
}

impl ContentStore for ApiClient {
    fn probe(&self, path: &str) -> RemoteState {
        let url = match self.contents_url(path) {
            Ok(url) => url,
            Err(e) => return RemoteState::ProbeFailed(e),
        };
        debug!(%url, branch = %self.credentials.branch, "probing");

        let res = match self
            .client
            .get(url)
            .query(&[("ref", self.credentials.branch.as_str())])
            .bearer_auth(&self.credentials.token)
            .timeout(PROBE_TIMEOUT)
            .send()
        {
            Ok(res) => res,
            Err(e) => return RemoteState::ProbeFailed(e.into()),
        };

        match res.status() {
            StatusCode::NOT_FOUND => RemoteState::Absent,
            StatusCode::OK => match res.json::<ContentMetadata>() {
                Ok(meta) => RemoteState::Present(VersionToken::new(meta.sha)),
                Err(e) => RemoteState::ProbeFailed(StoreError::Decode(e.to_string())),
            },
            _ => RemoteState::ProbeFailed(failure(res)),
        }
    }

    fn put(&self, path: &str, request: &WriteRequest) -> Result<VersionToken, StoreError> {
        let url = self.contents_url(path)?;
        debug!(%url, update = request.sha.is_some(), "writing");

        let res = self
            .client
            .put(url)
            .bearer_auth(&self.credentials.token)
            .json(request)
            .timeout(WRITE_TIMEOUT)
            .send()?;

        match res.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let body: PutResponse = res
                    .json()
                    .map_err(|e| StoreError::Decode(e.to_string()))?;
                Ok(VersionToken::new(body.content.sha))
            }
            _ => Err(failure(res)),
        }
    }
}
