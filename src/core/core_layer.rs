// The core module contains all upload logic.
// Nothing in here talks HTTP or reads the environment; the backend and auth
// collaborators are traits implemented in infra.

#[path = "auth/mod.rs"]
pub mod auth;

#[path = "batch/mod.rs"]
pub mod batch;

#[path = "selectors/mod.rs"]
pub mod selectors;

#[path = "upload/mod.rs"]
pub mod upload;
