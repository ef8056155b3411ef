//! Dobles de prueba compartidos por los tests de los módulos.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::classifier::{ClassifierError, InferenceClient};
use crate::types::KeypointFrame;

#[derive(Debug, Clone)]
pub enum Step {
    Probs(Vec<f32>),
    Delayed(Duration, Vec<f32>),
    Fail,
}

/// Clasificador determinista: devuelve los pasos en orden y repite el último
pub struct ScriptedClassifier {
    labels: Vec<String>,
    steps: VecDeque<Step>,
    last: Option<Step>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedClassifier {
    pub fn new(num_classes: usize, steps: Vec<Step>) -> Self {
        Self {
            labels: (0..num_classes).map(|i| format!("sign_{i}")).collect(),
            steps: steps.into(),
            last: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Contador de llamadas compartido (sigue vivo tras mover el clasificador)
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl InferenceClient for ScriptedClassifier {
    fn classify(&mut self, _window: &[KeypointFrame]) -> Result<Vec<f32>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let step = match self.steps.pop_front() {
            Some(step) => {
                self.last = Some(step.clone());
                step
            }
            None => self.last.clone().unwrap_or(Step::Fail),
        };

        match step {
            Step::Probs(probs) => Ok(probs),
            Step::Delayed(delay, probs) => {
                thread::sleep(delay);
                Ok(probs)
            }
            Step::Fail => Err(ClassifierError::NoOutputTensor),
        }
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Vector de probabilidades con `confidence` en `class_index` y el resto repartido
pub fn one_hot(num_classes: usize, class_index: usize, confidence: f32) -> Vec<f32> {
    let rest = (1.0 - confidence) / (num_classes - 1) as f32;
    (0..num_classes)
        .map(|i| if i == class_index { confidence } else { rest })
        .collect()
}

pub fn window_of(len: usize) -> Vec<KeypointFrame> {
    vec![KeypointFrame::zeros(); len]
}
