/// Reel uploader: picks a local video, obtains an upload session from the
/// broker and drives the tus transfer while tracking its state.
pub mod file;
pub mod orchestrator;
pub mod session_client;
pub mod ui;
