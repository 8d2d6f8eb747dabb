//! Common utilities and types shared across configkey

pub mod config;
pub mod error;
pub mod utils;

pub use config::ServiceConfig;
pub use error::{errno, Error, Result};
pub use utils::{binary_placeholder, is_binary, printable_value};
