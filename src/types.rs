use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Landmarks de pose (MediaPipe Holistic)
pub const POSE_LANDMARKS: usize = 33;
/// Landmarks de la malla facial
pub const FACE_LANDMARKS: usize = 468;
/// Landmarks por mano
pub const HAND_LANDMARKS: usize = 21;

/// Canales por landmark de pose: x, y, z, visibility
pub const POSE_CHANNELS: usize = 4;
/// Canales por landmark de cara y manos: x, y, z
pub const XYZ_CHANNELS: usize = 3;

pub const POSE_FEATURES: usize = POSE_LANDMARKS * POSE_CHANNELS; // 132
pub const FACE_FEATURES: usize = FACE_LANDMARKS * XYZ_CHANNELS; // 1404
pub const HAND_FEATURES: usize = HAND_LANDMARKS * XYZ_CHANNELS; // 63

/// Longitud fija del vector de keypoints: pose ‖ cara ‖ mano izq ‖ mano der
pub const KEYPOINT_FEATURES: usize = POSE_FEATURES + FACE_FEATURES + 2 * HAND_FEATURES; // 1662

/// Frames por ventana de inferencia
pub const SEQ_LEN: usize = 20;

/// Tamaño de imagen asumido cuando la detección no lo indica
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

/// Un landmark normalizado a [0, 1] respecto al tamaño del frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Solo la pose la reporta; en cara y manos se ignora
    #[serde(default)]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility: 0.0,
        }
    }
}

/// Resultado de detección de un frame, tal como lo entrega el extractor de landmarks.
/// Cualquier grupo puede faltar (p. ej. una mano fuera de cuadro).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(default)]
    pub pose: Option<Vec<Landmark>>,
    #[serde(default)]
    pub face: Option<Vec<Landmark>>,
    #[serde(default)]
    pub left_hand: Option<Vec<Landmark>>,
    #[serde(default)]
    pub right_hand: Option<Vec<Landmark>>,
    #[serde(default)]
    pub frame_width: Option<u32>,
    #[serde(default)]
    pub frame_height: Option<u32>,
}

impl DetectionResult {
    /// Landmarks de pose con acceso por nombre, si hay pose detectada
    pub fn pose_landmarks(&self) -> Option<PoseLandmarks<'_>> {
        match self.pose.as_deref() {
            Some(landmarks) if !landmarks.is_empty() => Some(PoseLandmarks(landmarks)),
            _ => None,
        }
    }

    /// (ancho, alto) del frame en píxeles
    pub fn frame_size(&self, default_width: u32, default_height: u32) -> (u32, u32) {
        (
            self.frame_width.unwrap_or(default_width),
            self.frame_height.unwrap_or(default_height),
        )
    }

    /// Reconstruye la pose a partir de un vector de keypoints ya aplanado.
    /// Un segmento de pose todo a cero se interpreta como pose ausente.
    pub fn from_keypoints(frame: &KeypointFrame) -> Self {
        let pose_segment = &frame.as_slice()[..POSE_FEATURES];
        let pose = if pose_segment.iter().all(|&v| v == 0.0) {
            None
        } else {
            Some(
                pose_segment
                    .chunks_exact(POSE_CHANNELS)
                    .map(|c| Landmark {
                        x: c[0],
                        y: c[1],
                        z: c[2],
                        visibility: c[3],
                    })
                    .collect(),
            )
        };

        Self {
            pose,
            ..Self::default()
        }
    }
}

/// Índices de la pose de MediaPipe (33 landmarks)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
}

impl PoseLandmark {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Vista de solo lectura sobre los landmarks de pose
#[derive(Debug, Clone, Copy)]
pub struct PoseLandmarks<'a>(&'a [Landmark]);

impl<'a> PoseLandmarks<'a> {
    pub fn get(&self, landmark: PoseLandmark) -> Option<&'a Landmark> {
        self.0.get(landmark.index())
    }
}

/// Vector de características de un frame: siempre KEYPOINT_FEATURES floats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct KeypointFrame(Vec<f32>);

impl KeypointFrame {
    /// Valida la longitud de un vector crudo
    pub fn from_vec(values: Vec<f32>) -> Result<Self, PipelineError> {
        if values.len() != KEYPOINT_FEATURES {
            return Err(PipelineError::InvalidFrameLength {
                expected: KEYPOINT_FEATURES,
                actual: values.len(),
            });
        }
        Ok(Self(values))
    }

    /// Solo para el vectorizador, que garantiza la longitud por construcción
    pub(crate) fn from_features(values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), KEYPOINT_FEATURES);
        Self(values)
    }

    pub fn zeros() -> Self {
        Self(vec![0.0; KEYPOINT_FEATURES])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }
}

impl TryFrom<Vec<f32>> for KeypointFrame {
    type Error = PipelineError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::from_vec(values)
    }
}

impl From<KeypointFrame> for Vec<f32> {
    fn from(frame: KeypointFrame) -> Self {
        frame.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_layout_constants() {
        assert_eq!(POSE_FEATURES, 132);
        assert_eq!(FACE_FEATURES, 1404);
        assert_eq!(HAND_FEATURES, 63);
        assert_eq!(KEYPOINT_FEATURES, 1662);
    }

    #[test]
    fn test_frame_rejects_wrong_length() {
        let err = KeypointFrame::from_vec(vec![0.0; 10]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidFrameLength {
                expected: 1662,
                actual: 10
            }
        ));
        assert!(KeypointFrame::from_vec(vec![0.5; KEYPOINT_FEATURES]).is_ok());
    }

    #[test]
    fn test_frame_deserialization_validates_length() {
        let short: Result<KeypointFrame, _> = serde_json::from_str("[0.1, 0.2]");
        assert!(short.is_err());

        let json = serde_json::to_string(&vec![0.0f32; KEYPOINT_FEATURES]).unwrap();
        let frame: KeypointFrame = serde_json::from_str(&json).unwrap();
        assert!(frame.is_zero());
    }

    #[test]
    fn test_detection_parses_with_missing_groups() {
        let json = r#"{"pose": [{"x": 0.5, "y": 0.4, "z": 0.0, "visibility": 0.9}], "frame_width": 1280}"#;
        let det: DetectionResult = serde_json::from_str(json).unwrap();
        assert!(det.face.is_none());
        assert!(det.left_hand.is_none());
        assert_eq!(det.frame_size(640, 480), (1280, 480));
        let pose = det.pose_landmarks().unwrap();
        assert_eq!(pose.get(PoseLandmark::Nose).unwrap().visibility, 0.9);
        assert!(pose.get(PoseLandmark::LeftWrist).is_none());
    }

    #[test]
    fn test_pose_recovered_from_keypoints() {
        let mut values = vec![0.0; KEYPOINT_FEATURES];
        // Nariz en (0.5, 0.25)
        values[0] = 0.5;
        values[1] = 0.25;
        values[3] = 1.0;
        let frame = KeypointFrame::from_vec(values).unwrap();
        let det = DetectionResult::from_keypoints(&frame);
        let pose = det.pose_landmarks().unwrap();
        let nose = pose.get(PoseLandmark::Nose).unwrap();
        assert_eq!((nose.x, nose.y, nose.visibility), (0.5, 0.25, 1.0));

        let empty = DetectionResult::from_keypoints(&KeypointFrame::zeros());
        assert!(empty.pose_landmarks().is_none());
    }
}
