//! Client for the sandbox API.
//!
//! Request/response calls go through `send_with_retry`; the generation
//! stream is opened once and never retried.

mod client;
mod edits;
mod files;
mod generation;
mod http;
mod types;

pub use client::ApiClient;
pub use edits::HttpEditGenerator;
pub use files::RemoteWorkspace;
pub use generation::HttpGenerationTransport;
pub use types::ApiError;
