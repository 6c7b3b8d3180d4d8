// Library root
// -----------
// This crate exposes the asset publisher as a library. The binary
// (`main.rs`) wires configuration, the HTTP store and the terminal UI
// together around the synchronizer.
//
// Module responsibilities:
// - `config`: typed credential bundle, config file loading and the
//   precondition checks that must pass before any network call.
// - `assets`: enumerates the local image directory into asset records.
// - `store`: the `ContentStore` seam and the tagged probe result.
// - `api`: blocking HTTP implementation of `ContentStore` against a
//   repository contents API.
// - `sync`: the probe -> upsert -> record loop and its run summary.
// - `error`: precondition and per-file store errors.
// - `ui`: confirmation prompt, progress bar and summary printing.
//
// The synchronizer only ever talks to `ContentStore`, so tests can swap
// the HTTP client for an in-memory store.
pub mod api;
pub mod assets;
pub mod config;
pub mod error;
pub mod store;
pub mod sync;
pub mod ui;

pub use error::{ConfigError, EnumerateError, PreconditionError, StoreError};
pub use store::{ContentStore, RemoteState, VersionToken, WriteRequest};
pub use sync::{RunSummary, Synchronizer, UpsertAction, UpsertOutcome};
