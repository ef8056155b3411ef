use tracing::debug;

use crate::types::{
    DetectionResult, KeypointFrame, Landmark, FACE_LANDMARKS, HAND_LANDMARKS, KEYPOINT_FEATURES,
    POSE_CHANNELS, POSE_LANDMARKS, XYZ_CHANNELS,
};

/// Convierte el resultado de detección de un frame en el vector plano de 1662 floats
/// que espera el modelo. Sin estado: la ausencia de un grupo es un dato, no un error.
pub struct KeypointVectorizer;

impl KeypointVectorizer {
    pub fn new() -> Self {
        Self
    }

    /// Orden fijo: pose (x,y,z,vis) ‖ cara (x,y,z) ‖ mano izq (x,y,z) ‖ mano der (x,y,z)
    pub fn vectorize(&self, detection: &DetectionResult) -> KeypointFrame {
        let mut features = Vec::with_capacity(KEYPOINT_FEATURES);

        append_group(&mut features, "pose", detection.pose.as_deref(), POSE_LANDMARKS, POSE_CHANNELS);
        append_group(&mut features, "face", detection.face.as_deref(), FACE_LANDMARKS, XYZ_CHANNELS);
        append_group(
            &mut features,
            "left_hand",
            detection.left_hand.as_deref(),
            HAND_LANDMARKS,
            XYZ_CHANNELS,
        );
        append_group(
            &mut features,
            "right_hand",
            detection.right_hand.as_deref(),
            HAND_LANDMARKS,
            XYZ_CHANNELS,
        );

        KeypointFrame::from_features(features)
    }
}

impl Default for KeypointVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Añade un grupo aplanado. Grupo ausente o vacío → ceros; tamaño inesperado →
/// se trunca o se rellena con ceros para mantener la longitud del segmento.
fn append_group(
    out: &mut Vec<f32>,
    name: &'static str,
    group: Option<&[Landmark]>,
    landmarks: usize,
    channels: usize,
) {
    let start = out.len();

    if let Some(group) = group.filter(|g| !g.is_empty()) {
        if group.len() != landmarks {
            debug!(
                group = name,
                expected = landmarks,
                actual = group.len(),
                "Grupo de landmarks con tamaño inesperado"
            );
        }

        for lm in group.iter().take(landmarks) {
            out.extend_from_slice(&[lm.x, lm.y, lm.z]);
            if channels == POSE_CHANNELS {
                out.push(lm.visibility);
            }
        }
    }

    out.resize(start + landmarks * channels, 0.0);
}
