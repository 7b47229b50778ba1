use image::{DynamicImage, ImageReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to start model program {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not send input to model command `{command}`: {source}")]
    Input {
        command: String,
        source: std::io::Error,
    },

    #[error("Model command `{command}` failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Model returned malformed output for `{command}`: {source}")]
    Decode {
        command: String,
        source: serde_json::Error,
    },

    #[error("Model returned an empty caption for {path}")]
    EmptyCaption { path: PathBuf },

    #[error("Model error: {message}")]
    Other { message: String },
}

/// A candidate image decoded once into RGB pixels.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub path: PathBuf,
    pub pixels: DynamicImage,
}

impl SourceImage {
    pub fn open(path: &Path) -> Result<Self, image::ImageError> {
        let pixels = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(Self {
            path: path.to_path_buf(),
            pixels: DynamicImage::ImageRgb8(pixels.into_rgb8()),
        })
    }
}

/// Joint image/text embedding model. Vectors from both sides share one
/// dimensionality and are compared by dot product after normalization.
pub trait EmbeddingModel: Send + Sync {
    fn embed_image(&self, image: &SourceImage) -> Result<Vec<f32>, ModelError>;

    /// Embeds every prompt; the result has one vector per prompt, in order.
    fn embed_text(&self, prompts: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;
}

pub trait Captioner: Send + Sync {
    fn caption(&self, image: &SourceImage) -> Result<String, ModelError>;
}
