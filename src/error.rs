use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Cannot read folder {}: {source}", .path.display())]
    FolderUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
