use folder_mcp_protocol::{EngineError, Result};

/// Numerically stable incremental mean of chunk embeddings, producing a
/// document-level embedding without holding every chunk vector in memory.
///
/// `new_mean = old_mean + (value - old_mean) / n`. Memory is O(dimension),
/// independent of how many chunks are folded in.
pub struct DocumentEmbeddingAggregator {
    dimension: usize,
    mean: Vec<f32>,
    count: usize,
}

impl DocumentEmbeddingAggregator {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            mean: vec![0.0; dimension],
            count: 0,
        }
    }

    /// Folds one chunk embedding into the running mean.
    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.count += 1;
        let n = self.count as f32;
        for (m, v) in self.mean.iter_mut().zip(vector) {
            *m += (v - *m) / n;
        }
        Ok(())
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// `None` if nothing was ever folded in.
    #[must_use]
    pub fn finish(self) -> Option<Vec<f32>> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mean_of_two_equal_vectors_is_unchanged() {
        let mut agg = DocumentEmbeddingAggregator::new(3);
        agg.add(&[1.0, 2.0, 3.0]).unwrap();
        agg.add(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(agg.finish(), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn mean_matches_naive_average() {
        let mut agg = DocumentEmbeddingAggregator::new(2);
        let inputs = [[1.0_f32, 0.0], [3.0, 0.0], [5.0, 0.0]];
        for v in &inputs {
            agg.add(v).unwrap();
        }
        let mean = agg.finish().unwrap();
        assert!((mean[0] - 3.0).abs() < 1e-5);
    }

    #[test]
    fn no_chunks_yields_none() {
        let agg = DocumentEmbeddingAggregator::new(4);
        assert_eq!(agg.finish(), None);
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let mut agg = DocumentEmbeddingAggregator::new(3);
        assert!(agg.add(&[1.0, 2.0]).is_err());
    }
}
