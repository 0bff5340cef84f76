use std::path::PathBuf;

/// Everything that can stop the viewer. Skippable resources are only ever
/// logged (see [`ViewerError::Unsupported`]), never returned from the binder
/// or renderer.
#[derive(thiserror::Error, Debug)]
pub enum ViewerError {
    #[error("failed to load glTF {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    #[error("unsupported resource: {0}")]
    Unsupported(String),

    #[error(
        "{what} range {offset}..{end} exceeds the {len} bytes available in {backing}"
    )]
    RangeViolation {
        what: String,
        offset: usize,
        end: usize,
        len: usize,
        backing: String,
    },

    #[error("graphics environment unavailable: {0}")]
    Environment(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ViewerError {
    pub fn load<T: ToString>(path: impl Into<PathBuf>, reason: T) -> Self {
        ViewerError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn environment<T: ToString>(msg: T) -> Self {
        ViewerError::Environment(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
