pub mod classifier;
pub mod config;
pub mod error;
pub mod frame_window;
pub mod gesture_state;
pub mod inference_worker;
pub mod keypoint_vectorizer;
pub mod pipeline;
pub mod posture;
pub mod stabilizer;
pub mod types;
pub mod window_io;

#[cfg(test)]
mod test_support;

pub use classifier::{ClassifierError, InferenceClient, Prediction};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use pipeline::{ConfirmedGestureEvent, FrameReport, GestureSession, SessionStatus};
pub use types::{DetectionResult, KeypointFrame, Landmark};
