use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::KeypointFrame;

/// Volcado de una ventana: `{"keypoints": [[1662 floats] x seq_len]}`
#[derive(Debug, Serialize, Deserialize)]
pub struct WindowFile {
    pub keypoints: Vec<KeypointFrame>,
}

/// Guarda la ventana que disparó una predicción, para reproducirla después
pub fn save_window_json(path: impl AsRef<Path>, window: &[KeypointFrame]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("No se pudo crear el directorio {:?}", parent))?;
    }

    let file = WindowFile {
        keypoints: window.to_vec(),
    };
    let json = serde_json::to_string(&file)?;
    fs::write(path, json).with_context(|| format!("No se pudo escribir {:?}", path))?;
    Ok(())
}

/// Carga una ventana volcada y comprueba que tiene `seq_len` frames.
/// La longitud de cada frame se valida al deserializar.
pub fn load_window_json(path: impl AsRef<Path>, seq_len: usize) -> Result<Vec<KeypointFrame>> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).with_context(|| format!("No se pudo abrir {:?}", path))?;
    let file: WindowFile = serde_json::from_str(&content)
        .with_context(|| format!("JSON de ventana inválido en {:?}", path))?;

    ensure!(
        file.keypoints.len() == seq_len,
        "La ventana de {:?} tiene {} frames (se esperaban {})",
        path,
        file.keypoints.len(),
        seq_len
    );

    Ok(file.keypoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KEYPOINT_FEATURES;

    fn frame(value: f32) -> KeypointFrame {
        KeypointFrame::from_vec(vec![value; KEYPOINT_FEATURES]).unwrap()
    }

    #[test]
    fn test_saved_window_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dumps").join("sample_keypoints.json");
        let window: Vec<KeypointFrame> = (0..20).map(|i| frame(i as f32 * 0.01)).collect();

        save_window_json(&path, &window).unwrap();
        let loaded = load_window_json(&path, 20).unwrap();
        assert_eq!(loaded, window);
    }

    #[test]
    fn test_file_uses_keypoints_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.json");
        save_window_json(&path, &[frame(0.0)]).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let rows = value["keypoints"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].as_array().unwrap().len(), KEYPOINT_FEATURES);
    }

    #[test]
    fn test_wrong_frame_count_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.json");
        save_window_json(&path, &vec![frame(0.1); 5]).unwrap();
        assert!(load_window_json(&path, 20).is_err());
    }

    #[test]
    fn test_short_frame_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.json");
        fs::write(&path, r#"{"keypoints": [[0.1, 0.2, 0.3]]}"#).unwrap();
        assert!(load_window_json(&path, 1).is_err());
    }
}
