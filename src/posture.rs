use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::types::{DetectionResult, PoseLandmark, PoseLandmarks};

/// Umbrales de las heurísticas de postura (coordenadas normalizadas)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    /// Distancia horizontal muñeca-hombro a partir de la cual el brazo está extendido
    pub arm_extension_limit: f32,
    /// Diferencia vertical máxima entre orejas para cabeza nivelada
    pub head_level_tolerance: f32,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            arm_extension_limit: 0.15,
            head_level_tolerance: 0.05,
        }
    }
}

impl PostureConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let ok = |v: f32| v.is_finite() && v > 0.0;
        if !ok(self.arm_extension_limit) || !ok(self.head_level_tolerance) {
            return Err(PipelineError::InvalidConfig(
                "posture thresholds must be finite and positive".into(),
            ));
        }
        Ok(())
    }
}

/// Líneas verticales de la rejilla 3x3, normalizadas al ancho
const CENTER_MIN_X: f32 = 1.0 / 3.0;
const CENTER_MAX_X: f32 = 2.0 / 3.0;

/// Heurísticas de un solo frame sobre la pose: postura neutral y centrado
pub struct PostureClassifier {
    config: PostureConfig,
}

impl PostureClassifier {
    pub fn new(config: PostureConfig) -> Self {
        Self { config }
    }

    /// Neutral = manos abajo, brazos pegados al cuerpo y cabeza nivelada.
    /// Sin pose (o con landmarks incompletos) nunca es neutral.
    pub fn is_neutral(&self, detection: &DetectionResult) -> bool {
        detection
            .pose_landmarks()
            .and_then(|pose| self.neutral_posture(&pose))
            .unwrap_or(false)
    }

    fn neutral_posture(&self, pose: &PoseLandmarks<'_>) -> Option<bool> {
        let left_wrist = pose.get(PoseLandmark::LeftWrist)?;
        let right_wrist = pose.get(PoseLandmark::RightWrist)?;
        let left_shoulder = pose.get(PoseLandmark::LeftShoulder)?;
        let right_shoulder = pose.get(PoseLandmark::RightShoulder)?;
        let left_ear = pose.get(PoseLandmark::LeftEar)?;
        let right_ear = pose.get(PoseLandmark::RightEar)?;

        // y crece hacia abajo en la imagen
        let hands_down = left_wrist.y > left_shoulder.y && right_wrist.y > right_shoulder.y;

        let limit = self.config.arm_extension_limit;
        let left_extended = (left_wrist.x - left_shoulder.x).abs() > limit;
        let right_extended = (right_wrist.x - right_shoulder.x).abs() > limit;
        let arms_not_extended = !(left_extended || right_extended);

        let head_level = (left_ear.y - right_ear.y).abs() < self.config.head_level_tolerance;

        Some(hands_down && arms_not_extended && head_level)
    }

    /// La nariz debe quedar entre las dos líneas verticales centrales de la
    /// rejilla 3x3 (1/3 y 2/3 del ancho, ambos incluidos). Solo informativo.
    /// Se compara en coordenadas normalizadas: la nariz exactamente sobre una
    /// línea cuenta como centrada para cualquier ancho.
    pub fn is_centered(&self, detection: &DetectionResult, frame_width: u32, _frame_height: u32) -> bool {
        if frame_width == 0 {
            return false;
        }

        detection
            .pose_landmarks()
            .and_then(|pose| pose.get(PoseLandmark::Nose))
            .map_or(false, |nose| (CENTER_MIN_X..=CENTER_MAX_X).contains(&nose.x))
    }
}

impl Default for PostureClassifier {
    fn default() -> Self {
        Self::new(PostureConfig::default())
    }
}

/// Aviso "colócate en el centro": se activa al salir del centro y se mantiene
/// `duration` frames después de volver a él.
pub struct CenterPrompt {
    duration: usize,
    timer: usize,
    active: bool,
}

impl CenterPrompt {
    pub fn new(duration: usize) -> Self {
        Self {
            duration,
            timer: 0,
            active: false,
        }
    }

    /// Actualiza con el centrado del frame actual y devuelve si el aviso sigue activo
    pub fn update(&mut self, centered: bool) -> bool {
        if !centered {
            self.active = true;
            self.timer = self.duration;
        } else {
            self.timer = self.timer.saturating_sub(1);
            if self.timer == 0 {
                self.active = false;
            }
        }
        self.active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reset(&mut self) {
        self.timer = 0;
        self.active = false;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Landmark, POSE_LANDMARKS};

    /// Pose de pie con los brazos abajo, nariz centrada
    pub(crate) fn neutral_pose() -> Vec<Landmark> {
        let mut pose = vec![Landmark::new(0.5, 0.5, 0.0); POSE_LANDMARKS];
        pose[PoseLandmark::Nose.index()] = Landmark::new(0.5, 0.2, 0.0);
        pose[PoseLandmark::LeftEar.index()] = Landmark::new(0.55, 0.2, 0.0);
        pose[PoseLandmark::RightEar.index()] = Landmark::new(0.45, 0.21, 0.0);
        pose[PoseLandmark::LeftShoulder.index()] = Landmark::new(0.6, 0.35, 0.0);
        pose[PoseLandmark::RightShoulder.index()] = Landmark::new(0.4, 0.35, 0.0);
        pose[PoseLandmark::LeftWrist.index()] = Landmark::new(0.62, 0.7, 0.0);
        pose[PoseLandmark::RightWrist.index()] = Landmark::new(0.38, 0.7, 0.0);
        pose
    }

    /// Misma pose con la mano derecha levantada por encima del hombro
    pub(crate) fn gesture_pose() -> Vec<Landmark> {
        let mut pose = neutral_pose();
        pose[PoseLandmark::RightWrist.index()] = Landmark::new(0.42, 0.25, 0.0);
        pose
    }

    fn detection(pose: Vec<Landmark>) -> DetectionResult {
        DetectionResult {
            pose: Some(pose),
            ..Default::default()
        }
    }

    #[test]
    fn test_neutral_pose_detected() {
        let classifier = PostureClassifier::default();
        assert!(classifier.is_neutral(&detection(neutral_pose())));
    }

    #[test]
    fn test_raised_hand_not_neutral() {
        let classifier = PostureClassifier::default();
        assert!(!classifier.is_neutral(&detection(gesture_pose())));
    }

    #[test]
    fn test_extended_arm_not_neutral() {
        let mut pose = neutral_pose();
        // Muñeca abajo pero lejos del hombro en x
        pose[PoseLandmark::LeftWrist.index()] = Landmark::new(0.80, 0.7, 0.0);
        assert!(!PostureClassifier::default().is_neutral(&detection(pose)));
    }

    #[test]
    fn test_tilted_head_not_neutral() {
        let mut pose = neutral_pose();
        pose[PoseLandmark::RightEar.index()] = Landmark::new(0.45, 0.28, 0.0);
        assert!(!PostureClassifier::default().is_neutral(&detection(pose)));
    }

    #[test]
    fn test_missing_pose_fails_closed() {
        let classifier = PostureClassifier::default();
        assert!(!classifier.is_neutral(&DetectionResult::default()));

        // Pose truncada: faltan muñecas
        let pose = neutral_pose()[..12].to_vec();
        assert!(!classifier.is_neutral(&detection(pose)));
    }

    #[test]
    fn test_custom_thresholds() {
        let mut pose = neutral_pose();
        pose[PoseLandmark::LeftWrist.index()] = Landmark::new(0.80, 0.7, 0.0);
        let lenient = PostureClassifier::new(PostureConfig {
            arm_extension_limit: 0.3,
            ..PostureConfig::default()
        });
        assert!(lenient.is_neutral(&detection(pose)));
    }

    #[test]
    fn test_centering_uses_middle_third() {
        let classifier = PostureClassifier::default();
        let with_nose = |x: f32| {
            let mut pose = neutral_pose();
            pose[PoseLandmark::Nose.index()] = Landmark::new(x, 0.2, 0.0);
            detection(pose)
        };

        assert!(classifier.is_centered(&with_nose(0.5), 640, 480));
        assert!(classifier.is_centered(&with_nose(0.34), 640, 480));
        assert!(classifier.is_centered(&with_nose(0.66), 640, 480));
        assert!(!classifier.is_centered(&with_nose(0.30), 640, 480));
        assert!(!classifier.is_centered(&with_nose(0.70), 640, 480));
    }

    #[test]
    fn test_centering_includes_grid_lines_at_any_width() {
        let classifier = PostureClassifier::default();
        let with_nose = |x: f32| {
            let mut pose = neutral_pose();
            pose[PoseLandmark::Nose.index()] = Landmark::new(x, 0.2, 0.0);
            detection(pose)
        };
        for width in [300, 480, 640, 1280, 1920] {
            for x in [1.0f32 / 3.0, 2.0f32 / 3.0] {
                let mut pose = neutral_pose();
                pose[PoseLandmark::Nose.index()] = Landmark::new(x, 0.2, 0.0);
                assert!(
                    classifier.is_centered(&detection(pose), width, 480),
                    "x={} width={}",
                    x,
                    width
                );
            }
        }
        assert!(!classifier.is_centered(&DetectionResult::default(), 640, 480));
        assert!(!classifier.is_centered(&with_nose(0.5), 0, 480));
    }

    #[test]
    fn test_center_prompt_holds_after_recentering() {
        let mut prompt = CenterPrompt::new(3);
        assert!(!prompt.update(true));
        assert!(prompt.update(false));
        assert!(prompt.update(true));
        assert!(prompt.update(true));
        assert!(!prompt.update(true));
        assert!(!prompt.is_active());
    }
}
