// The remote content store seam.
//
// `ContentStore` is the only thing the synchronizer knows about the
// remote side: a read that reports whether a path exists (and at which
// revision) and a create-or-replace write guarded by that revision.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Opaque revision identifier the store assigns to an object (a blob sha
/// for GitHub). Required to update an existing object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of probing one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteState {
    /// The store answered "not found".
    Absent,
    /// The object exists at this revision.
    Present(VersionToken),
    /// Anything else: auth failure, rate limiting, transport fault.
    ProbeFailed(StoreError),
}

impl RemoteState {
    /// Token to send with the write, if this is an update.
    pub fn version(&self) -> Option<&VersionToken> {
        match self {
            RemoteState::Present(token) => Some(token),
            _ => None,
        }
    }
}

/// Body of a create-or-replace write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub message: String,
    /// Base64 of the raw bytes.
    pub content: String,
    pub branch: String,
    /// Only set when updating an existing object.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sha: Option<VersionToken>,
}

impl WriteRequest {
    pub fn new(
        content: &[u8],
        message: impl Into<String>,
        branch: impl Into<String>,
        expected: Option<&VersionToken>,
    ) -> Self {
        Self {
            message: message.into(),
            content: STANDARD.encode(content),
            branch: branch.into(),
            sha: expected.cloned(),
        }
    }

    pub fn decoded_content(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.content)
    }
}

/// A versioned, path-addressed remote store.
pub trait ContentStore {
    /// Read-only existence/metadata lookup for `path` on the configured ref.
    fn probe(&self, path: &str) -> RemoteState;

    /// Create or replace `path`. Returns the object's new revision.
    fn put(&self, path: &str, request: &WriteRequest) -> Result<VersionToken, StoreError>;
}

impl<S: ContentStore + ?Sized> ContentStore for &S {
    fn probe(&self, path: &str) -> RemoteState {
        (**self).probe(path)
    }

    fn put(&self, path: &str, request: &WriteRequest) -> Result<VersionToken, StoreError> {
        (**self).put(path, request)
    }
}
