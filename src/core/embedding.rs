/// An L2-normalized embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Normalize `raw` to unit length. Returns `None` for empty, all-zero, or
    /// non-finite input, none of which has a direction to compare.
    pub fn normalized(raw: Vec<f32>) -> Option<Self> {
        if raw.is_empty() || raw.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            return None;
        }
        Some(Self(raw.into_iter().map(|v| v / norm).collect()))
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Cosine similarity, since both sides are unit length.
    pub fn dot(&self, other: &Embedding) -> f32 {
        self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum()
    }
}
