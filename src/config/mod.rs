//! Command line and settings file configuration

mod args;
mod settings;

pub use args::{Args, Command};
pub use settings::{BridgeSettings, ConfigError, LOCAL_FILE_NAME};
