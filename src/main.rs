use clap::{Parser, Subcommand};
use image_directives::cache::hash_bytes;
use image_directives::config;
use image_directives::engine::{AssetSink, Delivery, Engine};
use image_directives::imaging::RustBackend;
use image_directives::{cache, html, report};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "image-directives")]
#[command(about = "Process images from URL-style directive queries")]
#[command(long_about = "\
Process images from URL-style directive queries

A query lists directives; several values for one directive are separated by
';' and every combination becomes one variant:

  w=300;600&format=avif;webp&as=picture

produces four variants and prints a <picture> descriptor for them.

Directives:
  w, h, aspect/ar, fit, position, kernel, allowUpscale, basePixels
  rotate, flip, flop, flatten, background
  blur, median, tint, grayscale, hue, saturation, brightness, invert, normalize
  format, quality, progressive, lossless
  inline            deliver variants as data URLs
  as=<name>[:p;…]   url, srcset, img, picture, metadata, meta

Run 'image-directives gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the variants of a source image for one or more queries
    Process {
        /// Source image
        source: PathBuf,
        /// Directive query, e.g. "w=300;600&format=webp&as=srcset"
        #[arg(short, long = "query", required = true)]
        queries: Vec<String>,
        /// Directory to write variants to
        #[arg(long, default_value = "dist")]
        out: PathBuf,
        /// Print img/picture outputs as HTML instead of JSON
        #[arg(long)]
        html: bool,
        /// Disable the variant cache for this run
        #[arg(long)]
        no_cache: bool,
    },
    /// Delete cache entries older than the configured retention
    Sweep,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

/// Writes variants to a directory as `<stem>-<hash>.<ext>`.
struct DirectorySink {
    dir: PathBuf,
}

impl AssetSink for DirectorySink {
    fn emit(&self, name: &str, bytes: &[u8]) -> io::Result<String> {
        let path = Path::new(name);
        let stem = path.file_stem().unwrap_or_default().to_string_lossy();
        let ext = path.extension().unwrap_or_default().to_string_lossy();
        let hash = hash_bytes(bytes);
        let file_name = format!("{stem}-{}.{ext}", &hash[..8]);
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(&file_name), bytes)?;
        Ok(file_name)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let engine_config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(Path::new("."))?,
    };

    match cli.command {
        Command::Process {
            source,
            queries,
            out,
            html: as_html,
            no_cache,
        } => {
            init_thread_pool(&engine_config.processing);
            let variant_cache = if no_cache {
                cache::VariantCache::disabled()
            } else {
                engine_config.variant_cache(Path::new("."))
            };
            let engine = Engine::new(RustBackend::new(), engine_config, variant_cache);
            let bytes = std::fs::read(&source)?;
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let sink = DirectorySink { dir: out };

            for query in &queries {
                let Some(response) = engine.process(&bytes, &name, query, Delivery::Emit(&sink))?
                else {
                    println!("{name}?{query}: nothing to do");
                    continue;
                };
                report::print_process_report(&name, query, &response);
                let Some(value) = &response.value else {
                    continue;
                };
                match as_html.then(|| html::render(value, "")).flatten() {
                    Some(markup) => println!("{}", markup.into_string()),
                    None => println!("{}", serde_json::to_string_pretty(value)?),
                }
            }

            let swept = engine.end_build()?;
            println!("Cache: {}", engine.cache().stats());
            if swept > 0 {
                println!("Swept {swept} stale cache entries");
            }
        }
        Command::Sweep => {
            let variant_cache = engine_config.variant_cache(Path::new("."));
            let swept = variant_cache.sweep()?;
            println!("Swept {swept} stale cache entries");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Route `tracing` output to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
