//! allergen-scan - command-line front end
//!
//! Scans a label photo, a barcode or plain ingredient text and prints the
//! allergens found. Logs go to stderr, results to stdout.

use allergen_scan::capture::{BarcodeScanner, StdinBarcodeScanner};
use allergen_scan::config::{self, AppConfig};
use allergen_scan::{storage, Barcode, Detection, DetectionPipeline, Dictionary, RawImage, TextSource};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// allergen-scan - find allergens in food labels
#[derive(Parser, Debug)]
#[command(name = "allergen-scan")]
#[command(about = "Detect allergens in food label photos, barcodes and ingredient text")]
struct Args {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct Options {
    /// Config file (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Keyword dictionary file replacing the built-in one
    #[arg(long, global = true)]
    dictionary: Option<PathBuf>,

    /// Maximum edit distance for keyword matches
    #[arg(long, global = true)]
    max_distance: Option<usize>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a photo of an ingredient list
    Image {
        /// Image file (PNG, JPEG, ...)
        path: PathBuf,
        /// Upscale factor before OCR
        #[arg(long)]
        scale: Option<f32>,
        /// OCR language hint (e.g. "deu", "deu+eng")
        #[arg(long)]
        lang: Option<String>,
    },
    /// Scan ingredient text (read from stdin when omitted)
    Text { text: Option<String> },
    /// Look up a product by barcode (read from the scanner/stdin when omitted)
    Barcode { code: Option<String> },
    /// Print the active keyword dictionary as TOML
    Dictionary,
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.options.verbose);

    match args.command {
        Command::InitConfig { force } => init_config(args.options.config.as_deref(), force),
        command => run(command, &args.options).await,
    }
}

async fn run(command: Command, options: &Options) -> Result<()> {
    let mut config = load_or_create_config(options.config.as_deref())?;
    if let Some(max_distance) = options.max_distance {
        config.matching.max_distance = max_distance;
    }
    if let Some(path) = options.dictionary.clone() {
        config.dictionary.path = Some(path);
    }

    let dictionary = Arc::new(load_dictionary(&config)?);

    match command {
        Command::Dictionary => {
            print!("{}", dictionary.to_toml_string()?);
        }
        Command::Image { path, scale, lang } => {
            if let Some(scale) = scale {
                config.normalize.scale = scale;
            }
            if let Some(lang) = lang {
                config.ocr.language = lang;
            }
            let pipeline = DetectionPipeline::from_config(&config, dictionary)?;
            let image = RawImage::open(&path).with_context(|| format!("Failed to open image {}", path.display()))?;
            info!("Loaded {}x{} image from {:?}", image.width(), image.height(), path);

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let detection = pipeline.detect_image_cancellable(image, &cancel).await?;
            print_detection(&detection, options.json)?;
        }
        Command::Text { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buffer = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut buffer)
                        .await
                        .context("Failed to read text from stdin")?;
                    buffer
                }
            };
            let pipeline = DetectionPipeline::new(dictionary, (&config.matching).into());
            print_detection(&pipeline.analyze_text(&text), options.json)?;
        }
        Command::Barcode { code } => {
            let barcode = match code {
                Some(code) => Barcode::parse(&code)?,
                None => {
                    eprintln!("Waiting for barcode...");
                    let scanner: Box<dyn BarcodeScanner> = Box::new(StdinBarcodeScanner);
                    match scanner.scan().await? {
                        Some(barcode) => barcode,
                        None => {
                            warn!("Scanner closed without a barcode");
                            return Ok(());
                        }
                    }
                }
            };
            let pipeline = DetectionPipeline::from_config(&config, dictionary)?;
            let detection = pipeline.detect_barcode(&barcode).await?;
            print_detection(&detection, options.json)?;
        }
        Command::InitConfig { force } => init_config(options.config.as_deref(), force)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from an explicit path, the default location, or defaults
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = storage::default_config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring unreadable config {:?}: {:#}", config_path, e),
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Configured dictionary, a user dictionary in the config dir, or the built-in one
fn load_dictionary(config: &AppConfig) -> Result<Dictionary> {
    let path = match &config.dictionary.path {
        Some(path) => Some(path.clone()),
        None => storage::default_dictionary_path().ok().filter(|path| path.exists()),
    };

    let Some(path) = path else {
        return Ok(Dictionary::builtin());
    };
    info!("Using dictionary {:?}", path);
    let dictionary =
        Dictionary::load(&path).with_context(|| format!("Failed to load dictionary {}", path.display()))?;
    if dictionary.is_empty() {
        warn!("Dictionary {:?} has no keywords, nothing will be detected", path);
    }
    Ok(dictionary)
}

fn init_config(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => storage::default_config_path()?,
    };
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::save_config(&AppConfig::default(), &path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn print_detection(detection: &Detection, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(detection)?);
        return Ok(());
    }

    match &detection.source {
        TextSource::OcrFailed { reason } => println!("Text recognition failed: {}", reason),
        TextSource::Lookup { barcode, outcome } if !outcome.is_found() => {
            println!("Barcode {}: {}", barcode, outcome.text());
        }
        _ => {
            if detection.text.trim().is_empty() {
                println!("No text recognized.");
            } else {
                println!("Text:\n{}\n", detection.text.trim_end());
            }
        }
    }

    if detection.findings.is_empty() {
        println!("No allergens found.");
    } else {
        println!("Allergens found:");
        for finding in &detection.findings {
            println!(
                "  - {} ({} / {})",
                finding.token,
                finding.category.label(),
                finding.category.english_name()
            );
        }
    }
    Ok(())
}
