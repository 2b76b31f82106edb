//! HTTP client module: artifact transfer and status classification.

mod client;
mod status;

pub use client::{DEFAULT_TIMEOUT_SECS, HttpClient, USER_AGENT};
pub use status::{HttpStatusError, classify_status};
