use std::collections::VecDeque;

use crate::types::{KeypointFrame, KEYPOINT_FEATURES, SEQ_LEN};

/// Por debajo de esta desviación la ventana se considera estática
pub const LOW_VARIANCE_STD: f32 = 0.01;

/// Estadísticas simples de una ventana (diagnóstico de datos estáticos)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub std: f32,
}

/// Buffer FIFO de los últimos `capacity` frames: entrada del modelo
pub struct FrameWindow {
    buffer: VecDeque<KeypointFrame>,
    capacity: usize,
}

impl FrameWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Añade un frame; al superar la capacidad descarta el más antiguo
    pub fn push(&mut self, frame: KeypointFrame) {
        self.buffer.push_back(frame);

        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    /// Verdadero solo con exactamente `capacity` frames
    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Copia ordenada (más antiguo primero)
    pub fn snapshot(&self) -> Vec<KeypointFrame> {
        self.buffer.iter().cloned().collect()
    }

    /// Vista contigua sin copiar, en orden de llegada
    pub fn as_slice(&mut self) -> &[KeypointFrame] {
        self.buffer.make_contiguous()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeypointFrame> {
        self.buffer.iter()
    }

    /// Aplanado [t * 1662 + feature], el layout del tensor [1, T, 1662]
    pub fn to_flat(&self) -> Vec<f32> {
        flatten_frames(&self.buffer)
    }

    pub fn stats(&self) -> Option<WindowStats> {
        window_stats(self.buffer.iter())
    }
}

impl Default for FrameWindow {
    fn default() -> Self {
        Self::new(SEQ_LEN)
    }
}

/// Concatena los frames en orden: índice `t * KEYPOINT_FEATURES + feature`
pub fn flatten_frames<'a>(frames: impl IntoIterator<Item = &'a KeypointFrame>) -> Vec<f32> {
    let frames = frames.into_iter();
    let mut flat = Vec::with_capacity(frames.size_hint().0 * KEYPOINT_FEATURES);
    for frame in frames {
        flat.extend_from_slice(frame.as_slice());
    }
    flat
}

/// min/max/media/desviación típica (poblacional) de todos los valores
pub fn window_stats<'a>(frames: impl Iterator<Item = &'a KeypointFrame>) -> Option<WindowStats> {
    let mut count = 0usize;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;

    for frame in frames {
        for &v in frame.as_slice() {
            count += 1;
            sum += v as f64;
            sum_sq += (v as f64) * (v as f64);
            min = min.min(v);
            max = max.max(v);
        }
    }

    if count == 0 {
        return None;
    }

    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64 - mean * mean).max(0.0);

    Some(WindowStats {
        min,
        max,
        mean: mean as f32,
        std: variance.sqrt() as f32,
    })
}
