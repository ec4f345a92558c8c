/// FileWarden Core — change detection, command dispatch, and archiving.
///
/// This crate contains all business logic with zero transport dependencies.
/// The messaging channel is reached only through the [`gateway::Transfer`]
/// trait, so the engine can be driven by any frontend (Telegram, tests, CLI).
///
/// # Modules
///
/// - [`model`] — Identities, inbound requests, and the shared snapshot store.
/// - [`scanner`] — Folder change detection and the periodic scan scheduler.
/// - [`dispatch`] — Command parsing and the authorization-gated dispatcher.
/// - [`gateway`] — Transfer gateway trait and its deadline-bounded wrapper.
/// - [`archive`] — Recursive zip packaging of the watched folders.
/// - [`config`] — JSON settings loading and validation.
/// - [`deadline`] — Run a blocking operation on a worker thread with a timeout.
pub mod archive;
pub mod config;
pub mod deadline;
pub mod dispatch;
pub mod gateway;
pub mod model;
pub mod scanner;
