use std::path::PathBuf;
use thiserror::Error;

/// Failures of the external classifier or of the score it returned.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to load model {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("classifier rejected input of shape {got:?} (expected {expected:?})")]
    Shape { expected: Vec<usize>, got: Vec<usize> },

    #[error("classifier execution failed: {0}")]
    Runtime(String),

    #[error("classifier produced no output")]
    MissingOutput,

    #[error("classifier score {0} is outside [0, 1]")]
    OutOfRange(f32),
}

/// Failures of a video source. End of stream is not an error.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read frame source: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode frame {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("frame capture failed: {0}")]
    Capture(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write rendered frame: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode rendered frame: {0}")]
    Image(#[from] image::ImageError),

    #[error("display failed: {0}")]
    Display(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Anything that stops the engine loop before its source runs dry.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("frame source failed")]
    Source(#[from] SourceError),

    #[error("classifier failed on frame {frame_index}")]
    Classifier {
        frame_index: u64,
        #[source]
        source: ClassifierError,
    },

    #[error("renderer failed")]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("pipeline worker failed: {0}")]
    Worker(String),
}
