pub mod config;
pub mod error;
pub mod types;

pub use config::DeskmateConfig;
pub use error::{DeskmateError, Result};
pub use types::*;
