pub mod archive;
pub mod cleanup;
pub mod download;
pub mod error;
pub mod http;
pub mod install;
pub mod platform;
pub mod release;
pub mod runtime;

pub use error::{InstallError, Result};
