use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ocrs::postprocess::first_page;
use ocrs::{CommandEngineFactory, EngineRegistry, OcrPipeline, PageReport, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ocr-server")]
#[command(about = "OCR upload service with text-orientation analysis", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Recognize a local image or PDF
    Scan {
        /// Input image path
        image: PathBuf,
        #[arg(short, long)]
        language: Option<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Classify a saved raw engine result (file or stdin)
    Classify {
        input: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    /// JSON output with full details
    Json,
    /// Plain text, one line per detected text
    Text,
    /// TSV format: text\tscore\torientation\tx1,y1,x2,y2,...
    Tsv,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Settings::default(),
    };

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            ocrs::server::serve(settings)
                .await
                .context("server stopped with an error")?;
        }
        Command::Scan {
            image,
            language,
            format,
        } => {
            let report = scan(&settings, &image, language.as_deref()).await?;
            print_report(&report, format)?;
        }
        Command::Classify { input, format } => {
            let raw = read_raw(input.as_deref())?;
            let detections = first_page(&raw)?;
            let report = PageReport::from_detections(detections, &settings.orientation);
            print_report(&report, format)?;
        }
    }

    Ok(())
}

async fn scan(settings: &Settings, image: &Path, language: Option<&str>) -> Result<PageReport> {
    let factory = Arc::new(CommandEngineFactory::new(settings.engine.clone()));
    let registry = Arc::new(EngineRegistry::new(&settings.engine, factory));
    let pipeline = OcrPipeline::new(settings, registry);

    let language = pipeline.registry().resolve_language(language)?.to_string();
    let scratch = tempfile::Builder::new().prefix("ocrs-scan").tempdir()?;
    let run = pipeline
        .run(image, &language, scratch.path())
        .await
        .with_context(|| format!("recognizing {}", image.display()))?;
    Ok(run.report)
}

fn read_raw(input: Option<&Path>) -> Result<serde_json::Value> {
    let content = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    serde_json::from_str(&content).context("input is not valid JSON")
}

fn print_report(report: &PageReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            for block in &report.blocks {
                println!("{}", block.text);
            }
        }
        OutputFormat::Tsv => {
            for block in &report.blocks {
                let box_str = block
                    .polygon
                    .iter()
                    .map(|[x, y]| format!("{:.1},{:.1}", x, y))
                    .collect::<Vec<_>>()
                    .join(",");
                let score = block
                    .confidence
                    .map(|c| format!("{c:.3}"))
                    .unwrap_or_default();
                println!("{}\t{}\t{}\t{}", block.text, score, block.orientation, box_str);
            }
        }
    }
    Ok(())
}
