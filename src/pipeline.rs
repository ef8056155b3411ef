//! Sesión de reconocimiento para un único flujo de cámara.
//!
//! Une vectorizador, ventana, heurísticas de postura, máquina de estados,
//! votación y clasificador. Una instancia por signante; la API es `&mut self`
//! y no hay sincronización interna.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classifier::{argmax, label_for, top_k, validate_output, InferenceClient};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::frame_window::{window_stats, FrameWindow, LOW_VARIANCE_STD};
use crate::gesture_state::{GestureState, GestureStateMachine, StateMachineParams, Transition};
use crate::keypoint_vectorizer::KeypointVectorizer;
use crate::posture::{CenterPrompt, PostureClassifier};
use crate::stabilizer::PredictionStabilizer;
use crate::types::{DetectionResult, KeypointFrame};

/// Gesto confirmado: uno por excursión neutral → detecting → predicted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmedGestureEvent {
    pub label: String,
    pub class_index: usize,
    pub confidence: f32,
    pub stability: f32,
    pub frame_index: u64,
    pub top_k: Vec<(String, f32)>,
}

/// Texto de estado para la interfaz
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    Loading { filled: usize, capacity: usize },
    Ready,
    Detecting,
    Predicted { label: String },
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Loading { filled, capacity } => {
                write!(f, "Cargando... ({}/{})", filled, capacity)
            }
            SessionStatus::Ready => f.write_str("Ponte recto - listo para el gesto"),
            SessionStatus::Detecting => f.write_str("Detectando..."),
            SessionStatus::Predicted { label } => write!(f, "{} (Predicho)", label),
        }
    }
}

/// Salida por frame: señales informativas y, como mucho, un gesto confirmado
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub frame_index: u64,
    pub state: GestureState,
    pub neutral: bool,
    pub centered: bool,
    pub center_prompt: bool,
    pub neutral_frames: usize,
    pub gesture_frames: usize,
    pub window_len: usize,
    pub prediction_buffer_len: usize,
    pub status: SessionStatus,
    pub event: Option<ConfirmedGestureEvent>,
}

pub struct GestureSession {
    config: PipelineConfig,
    vectorizer: KeypointVectorizer,
    posture: PostureClassifier,
    center_prompt: CenterPrompt,
    window: FrameWindow,
    stabilizer: PredictionStabilizer,
    machine: GestureStateMachine,
    classifier: Box<dyn InferenceClient + Send>,
    frame_index: u64,
}

impl GestureSession {
    pub fn new(
        config: PipelineConfig,
        classifier: Box<dyn InferenceClient + Send>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        if classifier.labels().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "classifier exposes an empty label set".into(),
            ));
        }

        Ok(Self {
            vectorizer: KeypointVectorizer::new(),
            posture: PostureClassifier::new(config.posture),
            center_prompt: CenterPrompt::new(config.center_prompt_duration),
            window: FrameWindow::new(config.seq_len),
            stabilizer: PredictionStabilizer::new(
                config.stability_window,
                config.stability_threshold,
            ),
            machine: GestureStateMachine::new(StateMachineParams::from(&config)),
            classifier,
            frame_index: 0,
            config,
        })
    }

    /// Procesa el resultado de detección de un frame
    pub fn process(&mut self, detection: &DetectionResult) -> FrameReport {
        let frame = self.vectorizer.vectorize(detection);
        self.ingest(frame, detection)
    }

    /// Procesa un vector ya aplanado. Con longitud incorrecta se rechaza y la
    /// sesión queda exactamente como estaba.
    pub fn process_keypoints(&mut self, values: Vec<f32>) -> Result<FrameReport, PipelineError> {
        let frame = KeypointFrame::from_vec(values)?;
        let detection = DetectionResult::from_keypoints(&frame);
        Ok(self.ingest(frame, &detection))
    }

    fn ingest(&mut self, frame: KeypointFrame, detection: &DetectionResult) -> FrameReport {
        self.frame_index += 1;

        let (width, height) =
            detection.frame_size(self.config.frame_width, self.config.frame_height);
        let centered = self.posture.is_centered(detection, width, height);
        let center_prompt = self.center_prompt.update(centered);
        let neutral = self.posture.is_neutral(detection);

        self.window.push(frame);

        match self.machine.step(neutral) {
            Some(Transition::GestureStarted) => {
                self.stabilizer.clear();
                info!(frame = self.frame_index, "Gesto detectado - empezando predicción");
            }
            Some(Transition::GestureAbandoned) => {
                self.stabilizer.clear();
                info!(frame = self.frame_index, "Vuelta a posición neutral sin predicción");
            }
            Some(Transition::Released) => {
                info!(frame = self.frame_index, "Reinicio a neutral - listo para el siguiente gesto");
            }
            None => {}
        }

        let event = if self.machine.should_infer(self.window.is_full()) {
            self.run_inference()
        } else {
            None
        };

        FrameReport {
            frame_index: self.frame_index,
            state: self.machine.state(),
            neutral,
            centered,
            center_prompt,
            neutral_frames: self.machine.neutral_frames(),
            gesture_frames: self.machine.gesture_frames(),
            window_len: self.window.len(),
            prediction_buffer_len: self.stabilizer.len(),
            status: self.status(),
            event,
        }
    }

    /// Un fallo del clasificador deja el frame sin predicción; los contadores
    /// de la máquina ya se actualizaron y no se tocan.
    fn run_inference(&mut self) -> Option<ConfirmedGestureEvent> {
        let window = self.window.as_slice();
        if let Some(stats) = window_stats(window.iter()) {
            if stats.std < LOW_VARIANCE_STD {
                warn!(frame = self.frame_index, std = stats.std, "Ventana casi estática: ¿landmarks congelados?");
            }
        }
        let probabilities = match self.classifier.classify(window) {
            Ok(probabilities) => probabilities,
            Err(e) => {
                warn!(frame = self.frame_index, error = %e, "Fallo del clasificador; frame sin predicción");
                return None;
            }
        };

        let labels = self.classifier.labels();
        if let Err(e) = validate_output(&probabilities, labels) {
            warn!(frame = self.frame_index, error = %e, "Salida del clasificador con forma inválida");
            return None;
        }
        let prediction = match argmax(&probabilities) {
            Some(prediction) => prediction,
            None => {
                warn!(frame = self.frame_index, "Salida del clasificador sin valores válidos");
                return None;
            }
        };

        self.stabilizer.observe(prediction.class_index);
        let (stable_class, stability) = self.stabilizer.stable();

        let Some(class_index) = stable_class else {
            if self.stabilizer.len() >= self.config.stability_threshold {
                debug!(
                    frame = self.frame_index,
                    top = ?top_k(&probabilities, labels, self.config.top_k),
                    "Predicción inestable"
                );
            }
            return None;
        };

        if !self.machine.confirm(class_index, prediction.confidence) {
            debug!(
                frame = self.frame_index,
                confidence = prediction.confidence,
                threshold = self.config.confidence_threshold,
                top = ?top_k(&probabilities, labels, self.config.top_k),
                "Por debajo del umbral"
            );
            return None;
        }

        let event = ConfirmedGestureEvent {
            label: label_for(labels, class_index).to_string(),
            class_index,
            confidence: prediction.confidence,
            stability,
            frame_index: self.frame_index,
            top_k: top_k(&probabilities, labels, self.config.top_k),
        };
        self.stabilizer.clear();

        info!(
            label = %event.label,
            confidence = event.confidence,
            stability = event.stability,
            "Gesto predicho"
        );
        Some(event)
    }

    fn status(&self) -> SessionStatus {
        if !self.window.is_full() {
            return SessionStatus::Loading {
                filled: self.window.len(),
                capacity: self.window.capacity(),
            };
        }

        match self.machine.state() {
            GestureState::Neutral => SessionStatus::Ready,
            GestureState::Detecting => SessionStatus::Detecting,
            GestureState::Predicted => SessionStatus::Predicted {
                label: self.last_confirmed_label().unwrap_or("Unknown").to_string(),
            },
        }
    }

    /// Vuelve al estado inicial sin cambiar configuración ni clasificador
    pub fn reset(&mut self) {
        self.window.clear();
        self.stabilizer.clear();
        self.machine.reset();
        self.center_prompt.reset();
        self.frame_index = 0;
    }

    pub fn state(&self) -> GestureState {
        self.machine.state()
    }

    pub fn last_confirmed_label(&self) -> Option<&str> {
        self.machine
            .last_confirmed()
            .map(|idx| label_for(self.classifier.labels(), idx))
    }

    pub fn window(&self) -> &FrameWindow {
        &self.window
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn labels(&self) -> &[String] {
        self.classifier.labels()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}
