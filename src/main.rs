use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gallery_catalog::config::{CatalogConfig, ModelCommandConfig};
use gallery_catalog::core::catalog::{read_catalog, write_catalog};
use gallery_catalog::core::cycler::MetadataCycler;
use gallery_catalog::core::pipeline::{CatalogPipeline, Gatekeeper};
use gallery_catalog::core::selector::{AssetFilter, select_assets};
use gallery_catalog::services::CommandModel;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(
    name = "galcat",
    version,
    about = "Build the destination catalog for the travel gallery"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// JSON config file; missing keys keep their defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Gallery directory to catalog (default: `src/assets/gallery`)
    #[arg(short, long, value_name = "DIR")]
    root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deduplicate, caption and match every gallery image, then write the catalog
    Build {
        #[command(flatten)]
        common: CommonArgs,

        /// Catalog file to write (default: `src/data/destinations.generated.json`)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Worker threads for captioning and embedding
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Log and skip images that cannot be decoded instead of aborting
        #[arg(long)]
        skip_unreadable: bool,

        /// Model runner executable
        #[arg(long, value_name = "PATH")]
        model_program: Option<PathBuf>,

        /// Argument passed to the model runner before each request (repeatable)
        #[arg(long = "model-arg", value_name = "ARG", allow_hyphen_values = true)]
        model_args: Vec<String>,
    },

    /// List candidate images and the near-duplicates that would be dropped
    Scan {
        #[command(flatten)]
        common: CommonArgs,

        /// Existing catalog to check for entries whose file is gone
        #[arg(long, value_name = "FILE")]
        against: Option<PathBuf>,
    },

    /// Print the status and launch window assigned to each rank
    Schedule {
        /// JSON config file; missing keys keep their defaults
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Number of ranks to print
        #[arg(short = 'n', long, default_value_t = 11)]
        count: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            common,
            output,
            jobs,
            skip_unreadable,
            model_program,
            model_args,
        } => {
            let mut config = load_config(&common)?;
            if let Some(output) = output {
                config.output = output;
            }
            if let Some(jobs) = jobs {
                config.jobs = jobs;
            }
            config.skip_unreadable |= skip_unreadable;
            if let Some(program) = model_program {
                config.model = Some(ModelCommandConfig {
                    program,
                    args: model_args,
                });
            } else if !model_args.is_empty() {
                if let Some(model) = config.model.as_mut() {
                    model.args = model_args;
                }
            }

            let model_config = config.model.clone().context(
                "No model runner configured; pass --model-program or set `model` in the config file",
            )?;
            let model = CommandModel::from_config(&model_config);

            println!("▶ Building catalog from: {}", config.asset_root.display());
            let pipeline = CatalogPipeline::new(&config, &model, &model)
                .context("Failed to prepare destination matcher")?
                .with_progress(progress_bar()?);
            let run = benchmark("catalog build", || pipeline.run(&config.asset_root))?;

            for dup in &run.duplicates {
                println!(
                    "   📦 Skipped {} (duplicate of {})",
                    dup.path.display(),
                    dup.duplicate_of.display()
                );
            }
            for skipped in &run.skipped {
                eprintln!("⚠️  Unreadable {}: {}", skipped.path.display(), skipped.reason);
            }

            let summary = write_catalog(&config.output, &run.records)
                .with_context(|| format!("Failed to write catalog {:?}", config.output))?;
            println!(
                "\n✅ Wrote {} unique destinations to {} ({} candidates, {} duplicates, {} skipped)",
                summary.records,
                summary.path.display(),
                run.candidates,
                run.duplicates.len(),
                run.skipped.len()
            );
            println!("   digest {}", summary.digest.to_hex());
        }

        Commands::Scan { common, against } => {
            let config = load_config(&common)?;
            let root = &config.asset_root;
            println!("▶ Scanning for duplicates in: {}", root.display());

            let filter = AssetFilter::new(&config.image_extensions, &config.exclude_substrings);
            let candidates = select_assets(root, &filter)?;
            let bar = progress_bar()?;
            let gatekeeper = Gatekeeper::from_config(&config)?.with_progress(bar.clone());
            let outcome = benchmark("fingerprinting", || gatekeeper.run(&candidates))?;
            bar.finish_and_clear();

            println!(
                "Found {} candidate(s), {} unique",
                candidates.len(),
                outcome.accepted.len()
            );
            if outcome.duplicates.is_empty() {
                println!("No duplicates found.");
            }
            for dup in &outcome.duplicates {
                println!(
                    "   ▶ {} ≈ {}",
                    dup.path.display(),
                    dup.duplicate_of.display()
                );
            }
            for skipped in &outcome.skipped {
                eprintln!("⚠️  Unreadable {}: {}", skipped.path.display(), skipped.reason);
            }

            if let Some(catalog) = against {
                let records = read_catalog(&catalog)?;
                let base = root.parent().unwrap_or(root);
                let missing: Vec<_> = records
                    .iter()
                    .filter(|r| !base.join(&r.file).exists())
                    .collect();
                if missing.is_empty() {
                    println!("All {} catalogued file(s) present.", records.len());
                } else {
                    println!("{} catalogued file(s) missing:", missing.len());
                    for record in missing {
                        println!("   🗑️  {}", record.file);
                    }
                }
            }
        }

        Commands::Schedule { config, count } => {
            let config = CatalogConfig::load(config.as_deref())?;
            let cycler = MetadataCycler::new(
                config.status_cycle,
                config.launch_windows,
                config.launch_stride,
            )?;
            println!("{:>5}  {:<20}  {}", "rank", "status", "launch");
            for rank in 0..count {
                let assignment = cycler.assign(rank);
                println!(
                    "{:>5}  {:<20}  {}",
                    rank, assignment.status, assignment.launch_date
                );
            }
        }
    }

    Ok(())
}

fn load_config(common: &CommonArgs) -> Result<CatalogConfig> {
    let mut config = CatalogConfig::load(common.config.as_deref())?;
    if let Some(root) = &common.root {
        config.asset_root = root.clone();
    }
    Ok(config)
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} {msg} [{bar:30}] {pos}/{len}",
    )?);
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
