use thiserror::Error;

/// Errores del pipeline de segmentación (fuera del clasificador)
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidFrameLength { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
