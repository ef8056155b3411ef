use std::fmt;

use serde::Serialize;

use crate::config::PipelineConfig;

/// Parámetros de la máquina de estados
#[derive(Debug, Clone, Copy)]
pub struct StateMachineParams {
    /// Frames no neutrales seguidos para pasar a DETECTING (default: 5)
    pub gesture_threshold: usize,
    /// Frames neutrales seguidos para abandonar DETECTING (default: 8)
    pub neutral_threshold: usize,
    /// Frames en PREDICTED antes de volver a NEUTRAL (default: 30)
    pub reset_delay: usize,
    /// Confianza estricta mínima para confirmar (default: 0.3)
    pub confidence_threshold: f32,
}

impl Default for StateMachineParams {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for StateMachineParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            gesture_threshold: config.gesture_threshold,
            neutral_threshold: config.neutral_threshold,
            reset_delay: config.reset_delay,
            confidence_threshold: config.confidence_threshold,
        }
    }
}

/// Estados de la sesión de gestos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureState {
    /// Esperando a que el signante salga de la postura neutral
    Neutral,
    /// Gesto en curso: se intenta inferencia con cada ventana completa
    Detecting,
    /// Gesto confirmado; bloqueo durante `reset_delay` frames
    Predicted,
}

impl GestureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureState::Neutral => "NEUTRAL",
            GestureState::Detecting => "DETECTING",
            GestureState::Predicted => "PREDICTED",
        }
    }
}

impl fmt::Display for GestureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transición estructural producida por `step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// NEUTRAL → DETECTING
    GestureStarted,
    /// DETECTING → NEUTRAL sin predicción
    GestureAbandoned,
    /// PREDICTED → NEUTRAL al agotar el retardo
    Released,
}

/// Máquina de estados neutral → detecting → predicted → neutral.
/// Un único gesto confirmado por excursión.
pub struct GestureStateMachine {
    params: StateMachineParams,
    state: GestureState,
    neutral_frames: usize,
    gesture_frames: usize,
    reset_timer: usize,
    last_confirmed: Option<usize>,
}

impl GestureStateMachine {
    pub fn new(params: StateMachineParams) -> Self {
        Self {
            params,
            state: GestureState::Neutral,
            neutral_frames: 0,
            gesture_frames: 0,
            reset_timer: 0,
            last_confirmed: None,
        }
    }

    /// Avanza un frame con la postura observada. Como mucho una transición por frame.
    pub fn step(&mut self, is_neutral: bool) -> Option<Transition> {
        // Contadores de racha: cada uno se reinicia en cuanto se cumple el contrario
        if is_neutral {
            self.neutral_frames += 1;
            self.gesture_frames = 0;
        } else {
            self.gesture_frames += 1;
            self.neutral_frames = 0;
        }

        match self.state {
            GestureState::Neutral => {
                if self.gesture_frames >= self.params.gesture_threshold {
                    self.state = GestureState::Detecting;
                    return Some(Transition::GestureStarted);
                }
            }

            GestureState::Detecting => {
                if self.neutral_frames >= self.params.neutral_threshold {
                    self.state = GestureState::Neutral;
                    return Some(Transition::GestureAbandoned);
                }
            }

            GestureState::Predicted => {
                self.reset_timer += 1;

                if self.reset_timer >= self.params.reset_delay {
                    self.state = GestureState::Neutral;
                    self.reset_timer = 0;
                    self.last_confirmed = None;
                    return Some(Transition::Released);
                }
            }
        }

        None
    }

    /// Se debe consultar al clasificador solo en DETECTING con la ventana llena
    pub fn should_infer(&self, window_full: bool) -> bool {
        self.state == GestureState::Detecting && window_full
    }

    /// Intenta confirmar una clase estabilizada. Devuelve true si pasa a PREDICTED.
    pub fn confirm(&mut self, stable_class: usize, confidence: f32) -> bool {
        if self.state != GestureState::Detecting {
            return false;
        }
        if !(confidence > self.params.confidence_threshold) {
            return false;
        }
        if self.last_confirmed == Some(stable_class) {
            return false;
        }

        self.last_confirmed = Some(stable_class);
        self.reset_timer = 0;
        self.state = GestureState::Predicted;
        true
    }

    /// Vuelve al estado inicial (fin de sesión o reinicio explícito)
    pub fn reset(&mut self) {
        self.state = GestureState::Neutral;
        self.neutral_frames = 0;
        self.gesture_frames = 0;
        self.reset_timer = 0;
        self.last_confirmed = None;
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn neutral_frames(&self) -> usize {
        self.neutral_frames
    }

    pub fn gesture_frames(&self) -> usize {
        self.gesture_frames
    }

    pub fn reset_timer(&self) -> usize {
        self.reset_timer
    }

    pub fn last_confirmed(&self) -> Option<usize> {
        self.last_confirmed
    }
}
