//! Configuration merge system
//!
//! Implements the 5-layer configuration merge:
//! 1. Built-in defaults
//! 2. User config (~/.config/build-logic/config.toml)
//! 3. Project config (build-logic.toml)
//! 4. Environment (CC_CHUNK_SIZE, CC_MAX_CHUNKS, CC_WRITER_TIMEOUT_SECONDS)
//! 5. CLI flags

mod defaults;
mod effective;
mod merge;
mod settings;

use std::path::PathBuf;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigLayers, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{merge_into, merge_layers};
pub use settings::{AnalysisSettings, BeanSettings, Settings};

/// Project config file name, looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "build-logic.toml";

/// Default user config path, if a home directory is known
pub fn default_user_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config/build-logic/config.toml"))
}
