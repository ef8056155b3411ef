use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::types::KeypointFrame;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error: {0}")]
    OnnxError(#[from] ort::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid window: expected {expected} frames, got {actual}")]
    InvalidWindow { expected: usize, actual: usize },

    #[error("Invalid output size: expected {expected} classes, got {actual}")]
    InvalidOutputSize { expected: usize, actual: usize },

    #[error("No output tensor found")]
    NoOutputTensor,

    #[error("Missing ONNX {kind}")]
    MissingIo { kind: &'static str },

    #[error("Empty label map")]
    EmptyLabels,

    #[error("Inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("Inference worker disconnected")]
    WorkerDisconnected,
}

/// Clasificador externo: ventana completa → vector de probabilidades sobre
/// un conjunto fijo y ordenado de etiquetas.
pub trait InferenceClient {
    fn classify(&mut self, window: &[KeypointFrame]) -> Result<Vec<f32>, ClassifierError>;

    /// Etiquetas en el orden de salida del modelo
    fn labels(&self) -> &[String];
}

impl<C: InferenceClient + ?Sized> InferenceClient for Box<C> {
    fn classify(&mut self, window: &[KeypointFrame]) -> Result<Vec<f32>, ClassifierError> {
        (**self).classify(window)
    }

    fn labels(&self) -> &[String] {
        (**self).labels()
    }
}

/// Clase ganadora de un vector de probabilidades
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub confidence: f32,
}

/// argmax/max ignorando NaN. None si el vector está vacío o es todo NaN.
pub fn argmax(probabilities: &[f32]) -> Option<Prediction> {
    probabilities
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .fold(None, |best: Option<Prediction>, (idx, &p)| match best {
            Some(b) if b.confidence >= p => Some(b),
            _ => Some(Prediction {
                class_index: idx,
                confidence: p,
            }),
        })
}

/// Las `k` clases más probables, de mayor a menor
pub fn top_k(probabilities: &[f32], labels: &[String], k: usize) -> Vec<(String, f32)> {
    let mut indexed: Vec<(usize, f32)> = probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    indexed
        .into_iter()
        .take(k)
        .map(|(idx, p)| (label_for(labels, idx).to_string(), p))
        .collect()
}

pub fn label_for(labels: &[String], class_index: usize) -> &str {
    labels
        .get(class_index)
        .map(String::as_str)
        .unwrap_or("Unknown")
}

/// Comprueba que la salida del modelo encaja con el mapa de etiquetas
pub fn validate_output(probabilities: &[f32], labels: &[String]) -> Result<(), ClassifierError> {
    if probabilities.is_empty() || probabilities.len() != labels.len() {
        return Err(ClassifierError::InvalidOutputSize {
            expected: labels.len(),
            actual: probabilities.len(),
        });
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelFile {
    Indexed {
        index_to_class: HashMap<String, String>,
    },
    List(Vec<String>),
    /// `{"hola": 0, "adios": 1}`, el mapa que exporta el entrenamiento
    ByLabel(HashMap<String, usize>),
}

/// Carga el mapa de etiquetas: `{"index_to_class": {"0": "hola", ...}}`,
/// `{"hola": 0, ...}` o una lista.
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>, ClassifierError> {
    let content = fs::read_to_string(path)?;
    let labels = parse_labels(&content)?;
    if labels.is_empty() {
        return Err(ClassifierError::EmptyLabels);
    }
    Ok(labels)
}

fn parse_labels(content: &str) -> Result<Vec<String>, ClassifierError> {
    let data: LabelFile = serde_json::from_str(content)?;

    let labels = match data {
        LabelFile::List(labels) => labels,
        LabelFile::Indexed { index_to_class } => {
            // Convertir HashMap a Vec ordenado por índice
            let mut pairs: Vec<(usize, String)> = index_to_class
                .into_iter()
                .filter_map(|(k, v)| k.parse::<usize>().ok().map(|idx| (idx, v)))
                .collect();

            pairs.sort_by_key(|(idx, _)| *idx);
            pairs.into_iter().map(|(_, name)| name).collect()
        }
        LabelFile::ByLabel(class_to_index) => {
            let mut pairs: Vec<(usize, String)> = class_to_index
                .into_iter()
                .map(|(name, idx)| (idx, name))
                .collect();

            pairs.sort();
            pairs.into_iter().map(|(_, name)| name).collect()
        }
    };

    Ok(labels)
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

#[cfg(feature = "onnx")]
mod onnx {
    use super::{load_labels, ClassifierError, InferenceClient};
    use crate::frame_window::flatten_frames;
    use crate::types::{KeypointFrame, KEYPOINT_FEATURES};
    use ort::session::Session;
    use ort::tensor::TensorElementType;
    use ort::value::ValueType;
    use tracing::info;

    /// Modelo secuencial exportado a ONNX con entrada [1, seq_len, 1662]
    pub struct OnnxClassifier {
        session: Session,
        labels: Vec<String>,
        input_name: String,
        prob_output_name: String,
        seq_len: usize,
    }

    impl OnnxClassifier {
        pub fn new(model_path: &str, labels_path: &str, seq_len: usize) -> Result<Self, ClassifierError> {
            let labels = load_labels(labels_path)?;

            let session = Session::builder()?.commit_from_file(model_path)?;

            let input_name = session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or(ClassifierError::MissingIo { kind: "input" })?;

            let prob_output_name = session
                .outputs
                .iter()
                .find(|output| {
                    matches!(
                        output.output_type,
                        ValueType::Tensor {
                            ty: TensorElementType::Float32,
                            ..
                        }
                    )
                })
                .or_else(|| session.outputs.first())
                .map(|output| output.name.clone())
                .ok_or(ClassifierError::MissingIo { kind: "output" })?;

            info!(
                model = model_path,
                classes = labels.len(),
                input = %input_name,
                output = %prob_output_name,
                "Modelo ONNX cargado"
            );

            Ok(Self {
                session,
                labels,
                input_name,
                prob_output_name,
                seq_len,
            })
        }
    }

    impl InferenceClient for OnnxClassifier {
        fn classify(&mut self, window: &[KeypointFrame]) -> Result<Vec<f32>, ClassifierError> {
            if window.len() != self.seq_len {
                return Err(ClassifierError::InvalidWindow {
                    expected: self.seq_len,
                    actual: window.len(),
                });
            }

            // Tensor de entrada [1, seq_len, 1662]
            let input_data = flatten_frames(window);
            let shape_vec = vec![1_usize, self.seq_len, KEYPOINT_FEATURES];
            let input_value = ort::value::Value::from_array((shape_vec, input_data))?;

            let outputs = self.session.run(ort::inputs![
                self.input_name.as_str() => &input_value,
            ])?;

            let (prob_shape, prob_data) =
                outputs[self.prob_output_name.as_str()].try_extract_tensor::<f32>()?;

            let num_classes = match prob_shape.len() {
                0 => return Err(ClassifierError::NoOutputTensor),
                1 => prob_shape[0] as usize,
                _ => prob_shape[1] as usize,
            };

            Ok(prob_data.iter().take(num_classes).copied().collect())
        }

        fn labels(&self) -> &[String] {
            &self.labels
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("sign_{i}")).collect()
    }

    #[test]
    fn test_argmax_picks_first_maximum() {
        let p = argmax(&[0.1, 0.4, 0.4, 0.1]).unwrap();
        assert_eq!(p.class_index, 1);
        assert_eq!(p.confidence, 0.4);
        assert!(argmax(&[]).is_none());
    }

    #[test]
    fn test_argmax_skips_nan() {
        let p = argmax(&[f32::NAN, 0.2, 0.7]).unwrap();
        assert_eq!(p.class_index, 2);
        assert!(argmax(&[f32::NAN, f32::NAN]).is_none());
    }

    #[test]
    fn test_top_k_sorted_desc() {
        let top = top_k(&[0.1, 0.6, 0.05, 0.25], &labels(4), 3);
        let names: Vec<&str> = top.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(names, vec!["sign_1", "sign_3", "sign_0"]);
    }

    #[test]
    fn test_label_out_of_range_is_unknown() {
        assert_eq!(label_for(&labels(2), 1), "sign_1");
        assert_eq!(label_for(&labels(2), 5), "Unknown");
    }

    #[test]
    fn test_validate_output_shape() {
        assert!(validate_output(&[0.5, 0.5], &labels(2)).is_ok());
        assert!(matches!(
            validate_output(&[1.0], &labels(2)),
            Err(ClassifierError::InvalidOutputSize {
                expected: 2,
                actual: 1
            })
        ));
        assert!(validate_output(&[], &[]).is_err());
    }

    #[test]
    fn test_parse_indexed_labels_in_order() {
        let json = r#"{"index_to_class": {"2": "gracias", "0": "hola", "1": "adios"}}"#;
        assert_eq!(parse_labels(json).unwrap(), vec!["hola", "adios", "gracias"]);
    }

    #[test]
    fn test_parse_label_to_index_map_sorted_by_index() {
        let json = r#"{"gracias": 2, "hola": 0, "adios": 1}"#;
        assert_eq!(parse_labels(json).unwrap(), vec!["hola", "adios", "gracias"]);
    }

    #[test]
    fn test_load_labels_from_label_to_index_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"por_favor": 1, "buenos_dias": 0}}"#).unwrap();
        assert_eq!(
            load_labels(file.path()).unwrap(),
            vec!["buenos_dias", "por_favor"]
        );
    }

    #[test]
    fn test_parse_label_list() {
        assert_eq!(parse_labels(r#"["a", "b"]"#).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_load_labels_rejects_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        assert!(matches!(
            load_labels(file.path()),
            Err(ClassifierError::EmptyLabels)
        ));
    }
}
