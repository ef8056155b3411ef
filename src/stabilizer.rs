use std::collections::{BTreeMap, VecDeque};

/// Votación por mayoría sobre las últimas predicciones por frame.
/// Evita que un parpadeo del clasificador dispare un gesto.
pub struct PredictionStabilizer {
    history: VecDeque<usize>,
    window: usize,
    threshold: usize,
}

impl PredictionStabilizer {
    /// `window` predicciones recientes; el ganador necesita `threshold` votos
    pub fn new(window: usize, threshold: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(window + 1),
            window,
            threshold,
        }
    }

    pub fn observe(&mut self, class_index: usize) {
        self.history.push_back(class_index);
        while self.history.len() > self.window {
            self.history.pop_front();
        }
    }

    /// (clase, estabilidad). Devuelve (None, 0.0) si hay menos de `threshold`
    /// observaciones o si ninguna clase alcanza `threshold` votos.
    /// Empate: gana el índice de clase más bajo.
    pub fn stable(&self) -> (Option<usize>, f32) {
        if self.history.len() < self.threshold {
            return (None, 0.0);
        }

        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &class in &self.history {
            *counts.entry(class).or_insert(0) += 1;
        }

        // BTreeMap itera en orden ascendente: con `>` estricto se queda el menor
        let mut winner: Option<(usize, usize)> = None;
        for (&class, &count) in &counts {
            if winner.map_or(true, |(_, best)| count > best) {
                winner = Some((class, count));
            }
        }

        match winner {
            Some((class, count)) if count >= self.threshold => {
                (Some(class), count as f32 / self.history.len() as f32)
            }
            _ => (None, 0.0),
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(stabilizer: &mut PredictionStabilizer, classes: &[usize]) {
        for &c in classes {
            stabilizer.observe(c);
        }
    }

    #[test]
    fn test_none_below_min_observations() {
        let mut s = PredictionStabilizer::new(5, 3);
        assert_eq!(s.stable(), (None, 0.0));
        feed(&mut s, &[4, 4]);
        assert_eq!(s.stable(), (None, 0.0));
    }

    #[test]
    fn test_plurality_with_score() {
        let mut s = PredictionStabilizer::new(5, 3);
        feed(&mut s, &[1, 1, 2, 1, 3]);
        let (class, score) = s.stable();
        assert_eq!(class, Some(1));
        assert!((score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_flicker_is_not_stable() {
        let mut s = PredictionStabilizer::new(5, 3);
        feed(&mut s, &[1, 2, 1, 2, 3]);
        assert_eq!(s.stable(), (None, 0.0));
    }

    #[test]
    fn test_history_is_bounded_fifo() {
        let mut s = PredictionStabilizer::new(5, 3);
        feed(&mut s, &[9, 9, 9, 2, 2, 2, 2]);
        assert_eq!(s.len(), 5);
        // Quedan [9, 2, 2, 2, 2]
        let (class, score) = s.stable();
        assert_eq!(class, Some(2));
        assert!((score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_tie_breaks_to_lowest_index() {
        let mut s = PredictionStabilizer::new(6, 3);
        feed(&mut s, &[5, 5, 5, 2, 2, 2]);
        let (class, score) = s.stable();
        assert_eq!(class, Some(2));
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clear_resets_history() {
        let mut s = PredictionStabilizer::new(5, 3);
        feed(&mut s, &[7, 7, 7]);
        assert_eq!(s.stable().0, Some(7));
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.stable(), (None, 0.0));
    }
}
