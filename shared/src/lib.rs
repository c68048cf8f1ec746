/// Shared types for the Reel uploader: wire models, error types, the
/// transfer state machine and the tus client.
pub mod errors;
pub mod models;
pub mod transfer_state;
pub mod tus;
