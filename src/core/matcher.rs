use crate::core::destination::Destination;
use crate::core::embedding::Embedding;
use crate::core::model::{EmbeddingModel, ModelError};
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Destination list is empty")]
    NoDestinations,

    #[error("Expected {expected} prompt embeddings, model returned {actual}")]
    PromptCount { expected: usize, actual: usize },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Degenerate embedding for {subject}")]
    Degenerate { subject: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// The best destination for one image embedding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DestinationMatch<'a> {
    pub index: usize,
    pub destination: &'a Destination,
    /// Cosine similarity, unrounded.
    pub score: f32,
}

/// Scores image embeddings against one prompt embedding per destination.
#[derive(Debug)]
pub struct DestinationMatcher {
    destinations: Vec<Destination>,
    prompts: Vec<Embedding>,
}

pub fn render_prompt(template: &str, destination: &Destination) -> String {
    template.replace("{name}", &destination.name)
}

impl DestinationMatcher {
    /// Embed one rendered prompt per destination. Runs once per catalog build.
    pub fn new(
        destinations: Vec<Destination>,
        prompt_template: &str,
        model: &dyn EmbeddingModel,
    ) -> Result<Self, MatchError> {
        if destinations.is_empty() {
            return Err(MatchError::NoDestinations);
        }

        let prompts: Vec<String> = destinations
            .iter()
            .map(|d| render_prompt(prompt_template, d))
            .collect();
        debug!("Embedding {} destination prompts", prompts.len());
        let raw = model.embed_text(&prompts)?;
        if raw.len() != prompts.len() {
            return Err(MatchError::PromptCount {
                expected: prompts.len(),
                actual: raw.len(),
            });
        }

        let embeddings = raw
            .into_iter()
            .zip(&prompts)
            .map(|(vector, prompt)| {
                Embedding::normalized(vector).ok_or_else(|| MatchError::Degenerate {
                    subject: format!("prompt {:?}", prompt),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_embeddings(destinations, embeddings)
    }

    /// Build from prompt embeddings that are already normalized, one per
    /// destination in the same order.
    pub fn from_embeddings(
        destinations: Vec<Destination>,
        prompts: Vec<Embedding>,
    ) -> Result<Self, MatchError> {
        if destinations.is_empty() {
            return Err(MatchError::NoDestinations);
        }
        if prompts.len() != destinations.len() {
            return Err(MatchError::PromptCount {
                expected: destinations.len(),
                actual: prompts.len(),
            });
        }
        let dim = prompts[0].dim();
        if let Some(bad) = prompts.iter().find(|p| p.dim() != dim) {
            return Err(MatchError::DimensionMismatch {
                expected: dim,
                actual: bad.dim(),
            });
        }

        Ok(Self {
            destinations,
            prompts,
        })
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn dim(&self) -> usize {
        self.prompts[0].dim()
    }

    /// Argmax of cosine similarity. On equal scores the lower index wins.
    pub fn best_match(&self, image: &Embedding) -> Result<DestinationMatch<'_>, MatchError> {
        if image.dim() != self.dim() {
            return Err(MatchError::DimensionMismatch {
                expected: self.dim(),
                actual: image.dim(),
            });
        }

        let mut best = 0;
        let mut best_score = image.dot(&self.prompts[0]);
        for (index, prompt) in self.prompts.iter().enumerate().skip(1) {
            let score = image.dot(prompt);
            if score > best_score {
                best = index;
                best_score = score;
            }
        }

        Ok(DestinationMatch {
            index: best,
            destination: &self.destinations[best],
            score: best_score,
        })
    }

    /// Normalize a raw image vector from the model and match it.
    pub fn match_raw(&self, raw: Vec<f32>, subject: &str) -> Result<DestinationMatch<'_>, MatchError> {
        let image = Embedding::normalized(raw).ok_or_else(|| MatchError::Degenerate {
            subject: subject.to_string(),
        })?;
        self.best_match(&image)
    }
}
