//! Configuración inmutable del pipeline.
//!
//! Se construye una vez al arrancar (por defecto, desde JSON o desde flags)
//! y se pasa por referencia a cada sesión.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::posture::PostureConfig;
use crate::types::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, SEQ_LEN};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames por ventana de inferencia (default: 20)
    pub seq_len: usize,
    /// Frames no neutrales seguidos para empezar a detectar (default: 5)
    pub gesture_threshold: usize,
    /// Frames neutrales seguidos para abandonar la detección (default: 8)
    pub neutral_threshold: usize,
    /// Frames de espera en PREDICTED antes de volver a NEUTRAL (default: 30)
    pub reset_delay: usize,
    /// Confianza mínima (estricta) para confirmar un gesto (default: 0.3)
    pub confidence_threshold: f32,
    /// Predicciones recientes usadas en la votación (default: 5)
    pub stability_window: usize,
    /// Votos mínimos del ganador (default: 3)
    pub stability_threshold: usize,
    /// Frames que el aviso de centrado sigue activo tras recentrarse (default: 30)
    pub center_prompt_duration: usize,
    pub posture: PostureConfig,
    /// Tiempo máximo de una llamada al clasificador en modo worker
    pub inference_timeout_ms: u64,
    /// Clases a reportar en diagnósticos
    pub top_k: usize,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seq_len: SEQ_LEN,
            gesture_threshold: 5,
            neutral_threshold: 8,
            reset_delay: 30,
            confidence_threshold: 0.3,
            stability_window: 5,
            stability_threshold: 3,
            center_prompt_duration: 30,
            posture: PostureConfig::default(),
            inference_timeout_ms: 500,
            top_k: 3,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
        }
    }
}

impl PipelineConfig {
    /// Carga y valida una configuración JSON; los campos ausentes toman su default
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.seq_len == 0 {
            return invalid("seq_len must be greater than 0".into());
        }
        if self.gesture_threshold == 0 || self.neutral_threshold == 0 {
            return invalid("gesture and neutral thresholds must be greater than 0".into());
        }
        if self.reset_delay == 0 {
            return invalid("reset_delay must be greater than 0".into());
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return invalid(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if self.stability_window == 0 {
            return invalid("stability_window must be greater than 0".into());
        }
        if self.stability_threshold == 0 || self.stability_threshold > self.stability_window {
            return invalid(format!(
                "stability_threshold must be in 1..={}, got {}",
                self.stability_window, self.stability_threshold
            ));
        }
        if self.inference_timeout_ms == 0 {
            return invalid("inference_timeout_ms must be greater than 0".into());
        }
        self.posture.validate()
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }
}
