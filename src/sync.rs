// Probe → upsert → record, once per asset.
//
// Assets are processed strictly one after another in path order. A
// failure on one file is recorded in its outcome and never stops the
// batch; only `PreconditionError`s abort, and those are raised before
// the first request.

use tracing::{debug, info, warn};

use crate::assets::AssetRecord;
use crate::config::Credentials;
use crate::error::{PreconditionError, StoreError};
use crate::store::{ContentStore, RemoteState, VersionToken, WriteRequest};

pub const DEFAULT_MESSAGE_TEMPLATE: &str = "Upload image: {name}";

/// At least one file published (or nothing was asked of the run).
pub const EXIT_PUBLISHED: u8 = 0;
/// Every file failed.
pub const EXIT_ALL_FAILED: u8 = 1;
/// Configuration or precondition error; no file was attempted.
pub const EXIT_PRECONDITION: u8 = 2;

/// Whether a write created a new object or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Create,
    Update,
}

impl UpsertAction {
    fn for_state(state: &RemoteState) -> Option<Self> {
        match state {
            RemoteState::Absent => Some(UpsertAction::Create),
            RemoteState::Present(_) => Some(UpsertAction::Update),
            RemoteState::ProbeFailed(_) => None,
        }
    }
}

/// What happened to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub path: String,
    /// `None` when the probe failed and nothing was written.
    pub action: Option<UpsertAction>,
    /// The new revision on success, or `None` for a dry run.
    pub result: Result<Option<VersionToken>, StoreError>,
}

impl UpsertOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&StoreError> {
        self.result.as_ref().err()
    }

    pub fn new_version(&self) -> Option<&VersionToken> {
        self.result.as_ref().ok().and_then(|v| v.as_ref())
    }
}

/// Outcomes of a run, in processing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<UpsertOutcome>,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> Vec<(&str, &StoreError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error().map(|e| (o.path.as_str(), e)))
            .collect()
    }

    /// Zero successes count as an overall failure.
    pub fn is_success(&self) -> bool {
        self.succeeded() > 0
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            EXIT_PUBLISHED
        } else {
            EXIT_ALL_FAILED
        }
    }
}

/// Publishes assets to a [`ContentStore`] on behalf of one credential
/// bundle.
pub struct Synchronizer<S> {
    store: S,
    credentials: Credentials,
    message_template: String,
    dry_run: bool,
}

impl<S: ContentStore> Synchronizer<S> {
    /// Validate `credentials` and build a synchronizer. Fails without
    /// touching `store` when the credentials are unusable.
    pub fn new(store: S, credentials: Credentials) -> Result<Self, PreconditionError> {
        credentials.validate()?;
        Ok(Self {
            store,
            credentials,
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            dry_run: false,
        })
    }

    /// Commit message template; `{name}` is replaced by the file name.
    pub fn with_message_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = template.into();
        self
    }

    /// Probe only; report planned actions without writing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn commit_message(&self, file_name: &str) -> String {
        self.message_template.replace("{name}", file_name)
    }

    /// Current remote state of `path`. Read-only.
    pub fn probe(&self, path: &str) -> RemoteState {
        self.store.probe(path)
    }

    /// Write `content` to `path`. `state` must come from a [`probe`] of the
    /// same path just before: its token is sent only when the object
    /// exists, so a concurrent remote change is rejected by the store.
    ///
    /// [`probe`]: Synchronizer::probe
    pub fn upsert(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        state: &RemoteState,
    ) -> UpsertOutcome {
        let action = UpsertAction::for_state(state);
        if let RemoteState::ProbeFailed(err) = state {
            return UpsertOutcome {
                path: path.to_string(),
                action,
                result: Err(err.clone()),
            };
        }

        let request = WriteRequest::new(content, message, &self.credentials.branch, state.version());
        let result = self.store.put(path, &request).map(Some);
        UpsertOutcome {
            path: path.to_string(),
            action,
            result,
        }
    }

    /// Probe then upsert a single asset.
    pub fn sync_asset(&self, asset: &AssetRecord) -> UpsertOutcome {
        debug!(path = %asset.path, sha256 = %asset.sha256, bytes = asset.content.len(), "syncing");
        let state = self.probe(&asset.path);

        let outcome = if self.dry_run {
            UpsertOutcome {
                path: asset.path.clone(),
                action: UpsertAction::for_state(&state),
                result: match state {
                    RemoteState::ProbeFailed(err) => Err(err),
                    _ => Ok(None),
                },
            }
        } else {
            let message = self.commit_message(&asset.file_name);
            self.upsert(&asset.path, &asset.content, &message, &state)
        };

        match &outcome.result {
            Ok(version) => info!(
                path = %outcome.path,
                action = ?outcome.action,
                version = version.as_ref().map(VersionToken::as_str).unwrap_or("-"),
                "synced"
            ),
            Err(err) => warn!(path = %outcome.path, error = %err, "sync failed"),
        }
        outcome
    }

    /// Sync every asset in path order.
    pub fn run(&self, assets: Vec<AssetRecord>) -> Result<RunSummary, PreconditionError> {
        self.run_with(assets, |_| {})
    }

    /// Like [`run`](Synchronizer::run), calling `on_outcome` after each file.
    pub fn run_with(
        &self,
        mut assets: Vec<AssetRecord>,
        mut on_outcome: impl FnMut(&UpsertOutcome),
    ) -> Result<RunSummary, PreconditionError> {
        if assets.is_empty() {
            return Err(PreconditionError::EmptyBatch);
        }
        assets.sort_by(|a, b| a.path.cmp(&b.path));

        let mut outcomes = Vec::with_capacity(assets.len());
        for asset in &assets {
            let outcome = self.sync_asset(asset);
            on_outcome(&outcome);
            outcomes.push(outcome);
        }

        let summary = RunSummary {
            outcomes,
            dry_run: self.dry_run,
        };
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "run finished"
        );
        Ok(summary)
    }
}
