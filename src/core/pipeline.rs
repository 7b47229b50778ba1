use crate::config::{CatalogConfig, ConfigError};
use crate::core::catalog::{CatalogError, CatalogRecord, catalog_relative_path};
use crate::core::cycler::{CycleError, MetadataCycler};
use crate::core::fingerprint::{DedupGate, PerceptualHasher, Verdict};
use crate::core::matcher::{DestinationMatcher, MatchError};
use crate::core::model::{Captioner, EmbeddingModel, ModelError, SourceImage};
use crate::core::selector::{AssetFilter, SelectError, select_assets};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Model failed on {path}: {source}")]
    Model { path: PathBuf, source: ModelError },

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedImage {
    pub rank: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateImage {
    pub path: PathBuf,
    pub duplicate_of: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateOutcome {
    pub accepted: Vec<AcceptedImage>,
    pub duplicates: Vec<DuplicateImage>,
    pub skipped: Vec<SkippedImage>,
}

/// Decodes and fingerprints candidates in path order, keeping the first of
/// every group of near-identical images.
pub struct Gatekeeper {
    hasher: PerceptualHasher,
    threshold: u32,
    skip_unreadable: bool,
    progress: ProgressBar,
}

impl Gatekeeper {
    pub fn new(hash_size: u32, threshold: u32, skip_unreadable: bool) -> Self {
        Self {
            hasher: PerceptualHasher::new(hash_size),
            threshold,
            skip_unreadable,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self::new(
            config.hash_size,
            config.dedup_threshold,
            config.skip_unreadable,
        ))
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(&self, candidates: &[PathBuf]) -> Result<GateOutcome, PipelineError> {
        let mut gate = DedupGate::new(self.threshold);
        let mut outcome = GateOutcome::default();

        self.progress.set_length(candidates.len() as u64);
        self.progress.set_position(0);
        self.progress.set_message("Fingerprinting");

        for path in candidates {
            let image = match SourceImage::open(path) {
                Ok(image) => image,
                Err(err) if self.skip_unreadable => {
                    warn!("Skipping unreadable image {}: {}", path.display(), err);
                    outcome.skipped.push(SkippedImage {
                        path: path.clone(),
                        reason: err.to_string(),
                    });
                    self.progress.inc(1);
                    continue;
                }
                Err(source) => {
                    return Err(PipelineError::Image {
                        path: path.clone(),
                        source,
                    });
                }
            };

            let fingerprint = self.hasher.fingerprint(&image);
            debug!("{} -> {:?}", path.display(), fingerprint);
            match gate.offer(fingerprint) {
                Verdict::Accepted(rank) => outcome.accepted.push(AcceptedImage {
                    rank,
                    path: path.clone(),
                }),
                Verdict::DuplicateOf(rank) => {
                    let original = outcome.accepted[rank].path.clone();
                    info!(
                        "Dropping {} (near-duplicate of {})",
                        path.display(),
                        original.display()
                    );
                    outcome.duplicates.push(DuplicateImage {
                        path: path.clone(),
                        duplicate_of: original,
                    });
                }
            }
            self.progress.inc(1);
        }

        Ok(outcome)
    }
}

/// Turns one accepted image into its catalog record.
struct Enricher<'m> {
    matcher: DestinationMatcher,
    cycler: MetadataCycler,
    embedder: &'m dyn EmbeddingModel,
    captioner: &'m dyn Captioner,
}

impl Enricher<'_> {
    fn record(&self, asset_root: &Path, accepted: &AcceptedImage) -> Result<CatalogRecord, PipelineError> {
        let path = &accepted.path;
        let image = SourceImage::open(path).map_err(|source| PipelineError::Image {
            path: path.clone(),
            source,
        })?;
        let model_err = |source| PipelineError::Model {
            path: path.clone(),
            source,
        };

        let caption = self.captioner.caption(&image).map_err(model_err)?;
        let raw = self.embedder.embed_image(&image).map_err(model_err)?;
        let found = self.matcher.match_raw(raw, &path.display().to_string())?;
        let assignment = self.cycler.assign(accepted.rank);

        info!(
            "Processed {}: {} ({:.2})",
            path.file_name().unwrap_or_default().to_string_lossy(),
            found.destination.name,
            found.score
        );

        Ok(CatalogRecord {
            file: catalog_relative_path(asset_root, path),
            name: found.destination.name.clone(),
            region: found.destination.region.clone(),
            category: found.destination.category.clone(),
            status: assignment.status.to_string(),
            launch_date: assignment.launch_date.to_string(),
            caption: caption.trim().to_string(),
            similarity: f64::from(found.score),
        })
    }
}

/// Result of a full run, before the catalog is written.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRun {
    pub candidates: usize,
    pub duplicates: Vec<DuplicateImage>,
    pub skipped: Vec<SkippedImage>,
    pub records: Vec<CatalogRecord>,
}

pub struct CatalogPipeline<'m> {
    filter: AssetFilter,
    gatekeeper: Gatekeeper,
    enricher: Enricher<'m>,
    jobs: usize,
    progress: ProgressBar,
}

impl<'m> CatalogPipeline<'m> {
    /// Embeds the destination prompts up front, so a bad taxonomy or model
    /// fails before any image is read.
    pub fn new(
        config: &CatalogConfig,
        embedder: &'m dyn EmbeddingModel,
        captioner: &'m dyn Captioner,
    ) -> Result<Self, PipelineError> {
        let gatekeeper = Gatekeeper::from_config(config)?;
        let cycler = MetadataCycler::new(
            config.status_cycle.clone(),
            config.launch_windows.clone(),
            config.launch_stride,
        )?;
        let matcher = DestinationMatcher::new(
            config.destinations.clone(),
            &config.prompt_template,
            embedder,
        )?;
        info!(
            "Prepared {} destination prompts ({} dimensions)",
            matcher.destinations().len(),
            matcher.dim()
        );

        Ok(Self {
            filter: AssetFilter::new(&config.image_extensions, &config.exclude_substrings),
            gatekeeper,
            enricher: Enricher {
                matcher,
                cycler,
                embedder,
                captioner,
            },
            jobs: config.jobs,
            progress: ProgressBar::hidden(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.gatekeeper = self.gatekeeper.with_progress(progress.clone());
        self.progress = progress;
        self
    }

    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gatekeeper
    }

    /// Caption, embed and label every accepted image. Output order is the
    /// acceptance order whether or not the work runs in parallel.
    pub fn enrich(
        &self,
        asset_root: &Path,
        accepted: &[AcceptedImage],
    ) -> Result<Vec<CatalogRecord>, PipelineError> {
        self.progress.set_length(accepted.len() as u64);
        self.progress.set_position(0);
        self.progress.set_message("Captioning and matching");

        let enricher = &self.enricher;
        let progress = &self.progress;
        let build = |image: &AcceptedImage| {
            let record = enricher.record(asset_root, image);
            progress.inc(1);
            record
        };

        if self.jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()?;
            pool.install(|| accepted.par_iter().map(build).collect())
        } else {
            accepted.iter().map(build).collect()
        }
    }

    pub fn run(&self, asset_root: &Path) -> Result<CatalogRun, PipelineError> {
        let candidates = select_assets(asset_root, &self.filter)?;
        if candidates.is_empty() {
            warn!("No candidate images under {}", asset_root.display());
        } else {
            info!("Found {} raw images", candidates.len());
        }

        let outcome = self.gatekeeper.run(&candidates)?;
        let records = self.enrich(asset_root, &outcome.accepted)?;
        self.progress.finish_and_clear();

        Ok(CatalogRun {
            candidates: candidates.len(),
            duplicates: outcome.duplicates,
            skipped: outcome.skipped,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::write_catalog;
    use crate::core::destination::Destination;
    use crate::core::fingerprint::tests::cosine_texture;
    use image::codecs::jpeg::JpegEncoder;
    use image::imageops::FilterType;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Mean colour as the image embedding; prompts map to colour axes.
    #[derive(Default)]
    struct ColourModel {
        image_calls: AtomicUsize,
        text_calls: AtomicUsize,
        captions: AtomicUsize,
    }

    impl EmbeddingModel for ColourModel {
        fn embed_image(&self, image: &SourceImage) -> Result<Vec<f32>, ModelError> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            let rgb = image.pixels.to_rgb8();
            let mut sums = [0f32; 3];
            for pixel in rgb.pixels() {
                for (sum, value) in sums.iter_mut().zip(pixel.0) {
                    *sum += f32::from(value);
                }
            }
            Ok(sums.to_vec())
        }

        fn embed_text(&self, prompts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            Ok(prompts
                .iter()
                .map(|p| {
                    if p.contains("Red") {
                        vec![1.0, 0.0, 0.0]
                    } else if p.contains("Green") {
                        vec![0.0, 1.0, 0.0]
                    } else {
                        vec![0.0, 0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    impl Captioner for ColourModel {
        fn caption(&self, image: &SourceImage) -> Result<String, ModelError> {
            self.captions.fetch_add(1, Ordering::SeqCst);
            let stem = image.path.file_stem().unwrap_or_default().to_string_lossy();
            Ok(format!(" a photo of {} ", stem))
        }
    }

    fn test_config() -> CatalogConfig {
        CatalogConfig {
            destinations: vec![
                Destination::new("Red Place", "Europe", "Cities"),
                Destination::new("Green Place", "Asia", "Mountains"),
                Destination::new("Blue Place", "Oceania", "Beaches"),
            ],
            ..CatalogConfig::default()
        }
    }

    /// 64x64 image of 8px blocks filled with seeded noise in one channel, so
    /// distinct seeds give unrelated fingerprints.
    fn write_noise_image(path: &Path, seed: u64, channel: usize) {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        let mut blocks = [0u8; 64];
        for block in blocks.iter_mut() {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            *block = (state >> 56) as u8;
        }
        let img = ImageBuffer::from_fn(64, 64, |x, y| {
            let mut px = [0u8; 3];
            px[channel] = blocks[((y / 8) * 8 + x / 8) as usize];
            Rgb(px)
        });
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        img.save(path).unwrap();
    }

    /// assets/gallery with three distinct photos, one exact copy and a logo.
    fn sample_gallery(temp_dir: &TempDir) -> PathBuf {
        let root = temp_dir.path().join("assets").join("gallery");
        write_noise_image(&root.join("a_red.png"), 1, 0);
        write_noise_image(&root.join("b_blue.png"), 2, 2);
        fs::copy(root.join("a_red.png"), root.join("c_red_copy.png")).unwrap();
        write_noise_image(&root.join("nested").join("d_green.png"), 3, 1);
        write_noise_image(&root.join("paris-logo.png"), 4, 0);
        root
    }

    #[test]
    fn test_full_run() {
        let temp_dir = TempDir::new().unwrap();
        let root = sample_gallery(&temp_dir);
        let model = ColourModel::default();
        let pipeline = CatalogPipeline::new(&test_config(), &model, &model).unwrap();

        let run = pipeline.run(&root).unwrap();
        assert_eq!(run.candidates, 4);
        assert!(run.skipped.is_empty());
        assert_eq!(
            run.duplicates,
            vec![DuplicateImage {
                path: root.join("c_red_copy.png"),
                duplicate_of: root.join("a_red.png"),
            }]
        );

        let files: Vec<_> = run.records.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(
            files,
            vec!["gallery/a_red.png", "gallery/b_blue.png", "gallery/nested/d_green.png"]
        );
        let names: Vec<_> = run.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Red Place", "Blue Place", "Green Place"]);
        let statuses: Vec<_> = run.records.iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, vec!["HTTCoin Accepted", "Coming Soon", "In Negotiation"]);
        let launches: Vec<_> = run.records.iter().map(|r| r.launch_date.as_str()).collect();
        assert_eq!(launches, vec!["Now Live", "Q3 2025", "Q1 2026"]);

        let first = &run.records[0];
        assert_eq!(first.region, "Europe");
        assert_eq!(first.category, "Cities");
        assert_eq!(first.caption, "a photo of a_red");
        assert!((first.similarity - 1.0).abs() < 1e-6);

        // Only accepted images reach the models; prompts are embedded once.
        assert_eq!(model.text_calls.load(Ordering::SeqCst), 1);
        assert_eq!(model.image_calls.load(Ordering::SeqCst), 3);
        assert_eq!(model.captions.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_runs_are_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let root = sample_gallery(&temp_dir);
        let model = ColourModel::default();

        let sequential = CatalogPipeline::new(&test_config(), &model, &model).unwrap();
        let first = write_catalog(
            &temp_dir.path().join("one.json"),
            &sequential.run(&root).unwrap().records,
        )
        .unwrap();
        let second = write_catalog(
            &temp_dir.path().join("two.json"),
            &sequential.run(&root).unwrap().records,
        )
        .unwrap();

        let parallel_config = CatalogConfig {
            jobs: 4,
            ..test_config()
        };
        let parallel = CatalogPipeline::new(&parallel_config, &model, &model).unwrap();
        let third = write_catalog(
            &temp_dir.path().join("three.json"),
            &parallel.run(&root).unwrap().records,
        )
        .unwrap();

        assert_eq!(first.digest, second.digest);
        assert_eq!(first.digest, third.digest);
        assert_eq!(
            fs::read(temp_dir.path().join("one.json")).unwrap(),
            fs::read(temp_dir.path().join("three.json")).unwrap()
        );
    }

    #[test]
    fn test_empty_gallery_gives_empty_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("gallery");
        fs::create_dir_all(&root).unwrap();
        write_noise_image(&root.join("brand-logo.png"), 9, 0);

        let model = ColourModel::default();
        let pipeline = CatalogPipeline::new(&test_config(), &model, &model).unwrap();
        let run = pipeline.run(&root).unwrap();
        assert_eq!(run.candidates, 0);
        assert!(run.records.is_empty());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let model = ColourModel::default();
        let pipeline = CatalogPipeline::new(&test_config(), &model, &model).unwrap();
        let result = pipeline.run(&temp_dir.path().join("nowhere"));
        assert!(matches!(
            result,
            Err(PipelineError::Select(SelectError::MissingRoot { .. }))
        ));
    }

    #[test]
    fn test_empty_destinations_fail_fast() {
        let model = ColourModel::default();
        let config = CatalogConfig {
            destinations: Vec::new(),
            ..CatalogConfig::default()
        };
        let result = CatalogPipeline::new(&config, &model, &model);
        assert!(matches!(
            result,
            Err(PipelineError::Match(MatchError::NoDestinations))
        ));
        assert_eq!(model.text_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_corrupt_image_is_fatal_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let root = sample_gallery(&temp_dir);
        fs::write(root.join("b_broken.png"), b"definitely not a png").unwrap();

        let model = ColourModel::default();
        let pipeline = CatalogPipeline::new(&test_config(), &model, &model).unwrap();
        let err = pipeline.run(&root).unwrap_err();
        assert!(matches!(err, PipelineError::Image { .. }));
        assert!(err.to_string().contains("b_broken.png"));
        assert_eq!(model.captions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_skip_unreadable_reports_and_excludes() {
        let temp_dir = TempDir::new().unwrap();
        let root = sample_gallery(&temp_dir);
        fs::write(root.join("b_broken.png"), b"definitely not a png").unwrap();

        let model = ColourModel::default();
        let config = CatalogConfig {
            skip_unreadable: true,
            ..test_config()
        };
        let pipeline = CatalogPipeline::new(&config, &model, &model).unwrap();
        let run = pipeline.run(&root).unwrap();

        assert_eq!(run.candidates, 5);
        assert_eq!(run.skipped.len(), 1);
        assert_eq!(run.skipped[0].path, root.join("b_broken.png"));
        assert_eq!(run.records.len(), 3);
        assert!(run.records.iter().all(|r| !r.file.contains("broken")));
        // Ranks count accepted images only.
        assert_eq!(run.records[1].status, "Coming Soon");
    }

    #[test]
    fn test_gatekeeper_keeps_first_in_path_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("gallery");
        write_noise_image(&root.join("z_original.png"), 5, 1);
        fs::copy(root.join("z_original.png"), root.join("a_copy.png")).unwrap();
        write_noise_image(&root.join("m_other.png"), 6, 1);

        let filter = AssetFilter::new(&["png".to_string()], &[]);
        let candidates = select_assets(&root, &filter).unwrap();
        let outcome = Gatekeeper::new(16, 1, false).run(&candidates).unwrap();

        assert_eq!(
            outcome.accepted,
            vec![
                AcceptedImage {
                    rank: 0,
                    path: root.join("a_copy.png")
                },
                AcceptedImage {
                    rank: 1,
                    path: root.join("m_other.png")
                },
            ]
        );
        assert_eq!(outcome.duplicates[0].path, root.join("z_original.png"));
        assert_eq!(outcome.duplicates[0].duplicate_of, root.join("a_copy.png"));
    }

    #[test]
    fn test_resized_jpeg_copy_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("gallery");
        fs::create_dir_all(&root).unwrap();
        let original = DynamicImage::ImageLuma8(cosine_texture(128));
        original.save(root.join("a_harbour.png")).unwrap();
        let small = original.resize_exact(96, 96, FilterType::Triangle);
        let file = fs::File::create(root.join("b_harbour_small.jpg")).unwrap();
        small
            .write_with_encoder(JpegEncoder::new_with_quality(file, 90))
            .unwrap();
        write_noise_image(&root.join("c_market.png"), 7, 0);

        let model = ColourModel::default();
        let pipeline = CatalogPipeline::new(&test_config(), &model, &model).unwrap();
        let run = pipeline.run(&root).unwrap();

        assert_eq!(run.candidates, 3);
        assert_eq!(
            run.duplicates,
            vec![DuplicateImage {
                path: root.join("b_harbour_small.jpg"),
                duplicate_of: root.join("a_harbour.png"),
            }]
        );
        let files: Vec<_> = run.records.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, vec!["gallery/a_harbour.png", "gallery/c_market.png"]);
    }
}
