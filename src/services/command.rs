//! Model adapter that shells out to an external runner.
//!
//! The runner is invoked once per request with a subcommand appended to the
//! configured arguments:
//!
//! - `caption <image>` prints the caption on stdout
//! - `embed-image <image>` prints a JSON array of numbers
//! - `embed-text` reads a JSON array of strings on stdin and prints a JSON
//!   array of arrays, one per prompt

use crate::config::ModelCommandConfig;
use crate::core::model::{Captioner, EmbeddingModel, ModelError, SourceImage};
use log::debug;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

#[derive(Debug, Clone)]
pub struct CommandModel {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandModel {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ModelCommandConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    fn describe(&self, request: &[&str]) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.extend(request.iter().map(|s| s.to_string()));
        parts.join(" ")
    }

    fn invoke(&self, request: &[&str], stdin: Option<&[u8]>) -> Result<Vec<u8>, ModelError> {
        let command = self.describe(request);
        debug!("Running model command: {}", command);

        let spawn_err = |source| ModelError::Spawn {
            program: self.program.clone(),
            source,
        };
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(request)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // The runner may exit without reading its input. Its exit status and
        // stderr take precedence over the failed write.
        let written = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => pipe.write_all(input),
            _ => Ok(()),
        };

        let Output {
            status,
            stdout,
            stderr,
        } = child.wait_with_output().map_err(spawn_err)?;

        if !status.success() {
            return Err(ModelError::Failed {
                command,
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        written.map_err(|source| ModelError::Input { command, source })?;
        Ok(stdout)
    }

    fn invoke_json<T: DeserializeOwned>(
        &self,
        request: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<T, ModelError> {
        let stdout = self.invoke(request, stdin)?;
        serde_json::from_slice(&stdout).map_err(|source| ModelError::Decode {
            command: self.describe(request),
            source,
        })
    }
}

impl Captioner for CommandModel {
    fn caption(&self, image: &SourceImage) -> Result<String, ModelError> {
        let path = image.path.to_string_lossy().into_owned();
        let stdout = self.invoke(&["caption", path.as_str()], None)?;
        let caption = String::from_utf8_lossy(&stdout).trim().to_string();
        if caption.is_empty() {
            return Err(ModelError::EmptyCaption {
                path: image.path.clone(),
            });
        }
        Ok(caption)
    }
}

impl EmbeddingModel for CommandModel {
    fn embed_image(&self, image: &SourceImage) -> Result<Vec<f32>, ModelError> {
        let path = image.path.to_string_lossy().into_owned();
        self.invoke_json(&["embed-image", path.as_str()], None)
    }

    fn embed_text(&self, prompts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let input = serde_json::to_vec(prompts).map_err(|source| ModelError::Decode {
            command: self.describe(&["embed-text"]),
            source,
        })?;
        self.invoke_json(&["embed-text"], Some(input.as_slice()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    // A shell stand-in for a real model runner.
    const RUNNER: &str = r#"
case "$1" in
  caption) echo "  a photo of $(basename "$2")  " ;;
  embed-image) echo '[0.5, 0.25, 0.0]' ;;
  embed-text) cat > /dev/null; echo '[[1, 0, 0], [0, 1, 0]]' ;;
  broken) echo 'not json' ;;
  refuse) echo "no input expected" >&2; exit 4 ;;
  *) echo "unknown request $1" >&2; exit 3 ;;
esac
"#;

    fn runner(dir: &TempDir) -> CommandModel {
        let script = dir.path().join("runner.sh");
        fs::write(&script, RUNNER).unwrap();
        CommandModel::new("sh", vec![script.to_string_lossy().into_owned()])
    }

    fn image(path: &str) -> SourceImage {
        SourceImage {
            path: PathBuf::from(path),
            pixels: DynamicImage::ImageRgb8(RgbImage::new(2, 2)),
        }
    }

    #[test]
    fn test_caption_is_trimmed() {
        let dir = TempDir::new().unwrap();
        let model = runner(&dir);
        let caption = model.caption(&image("/photos/paris.jpg")).unwrap();
        assert_eq!(caption, "a photo of paris.jpg");
    }

    #[test]
    fn test_embeddings_are_parsed() {
        let dir = TempDir::new().unwrap();
        let model = runner(&dir);
        assert_eq!(
            model.embed_image(&image("x.png")).unwrap(),
            vec![0.5, 0.25, 0.0]
        );
        let text = model
            .embed_text(&["Travel photo of A".into(), "Travel photo of B".into()])
            .unwrap();
        assert_eq!(text, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_failure_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let model = runner(&dir);
        let err = model.invoke(&["nonsense"], None).unwrap_err();
        match err {
            ModelError::Failed { stderr, .. } => assert_eq!(stderr, "unknown request nonsense"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_runner_that_ignores_input_reports_its_stderr() {
        let dir = TempDir::new().unwrap();
        let model = runner(&dir);
        // Larger than a pipe buffer, so the write fails once the runner exits.
        let input = vec![b'x'; 1 << 20];
        let err = model.invoke(&["refuse"], Some(input.as_slice())).unwrap_err();
        match err {
            ModelError::Failed { status, stderr, .. } => {
                assert!(status.contains('4'), "status was {status}");
                assert_eq!(stderr, "no input expected");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_output() {
        let dir = TempDir::new().unwrap();
        let model = runner(&dir);
        let result: Result<Vec<f32>, _> = model.invoke_json(&["broken"], None);
        assert!(matches!(result, Err(ModelError::Decode { .. })));
    }

    #[test]
    fn test_missing_program() {
        let model = CommandModel::new("/definitely/not/a/model-runner", vec![]);
        let result = model.embed_text(&["x".into()]);
        assert!(matches!(result, Err(ModelError::Spawn { .. })));
    }
}
