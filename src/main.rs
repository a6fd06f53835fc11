use clap::{Args, Parser, Subcommand, builder::styling};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tabextract::{
    Auth, AuthType, CacheKey, DataExtractor, Extraction, ExtractionRequest, ExtractorConfig,
    SourceKind, storage::write_table,
};
use url::Url;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Tabular Extract: pull a table out of an API or a flat file, one call shape for every source
#[derive(Parser)]
#[command(name = "tabx", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source settings and credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Entity the data belongs to (used in logs)
    #[arg(long, default_value = "ALL")]
    entity: String,

    /// Business date of the extraction (used in logs)
    #[arg(long, default_value = "")]
    date: String,

    /// Cache the result as <CACHE_NAME>.csv and reuse it on later runs
    #[arg(long)]
    cache_name: Option<String>,

    /// Directory for cached results [default: TABX_CACHE_DIR or .]
    #[arg(long, requires = "cache_name")]
    cache_dir: Option<PathBuf>,

    /// Write the table to this CSV file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a JSON endpoint and tabulate its "data" field
    Api {
        /// Endpoint to GET
        url: Url,

        /// Authentication scheme, credentials come from TABX_API_* variables
        #[arg(long, value_enum)]
        auth: Option<AuthType>,

        #[command(flatten)]
        target: Target,
    },

    /// Read a delimited file whose first column is the row index
    Csv {
        /// File to read
        path: PathBuf,

        /// Field delimiter
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,

        #[command(flatten)]
        target: Target,
    },

    /// Run an extraction request described in a JSON file
    Request {
        /// JSON file with "source", "entity", "date" and "params"
        file: PathBuf,

        #[command(flatten)]
        target: Target,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if Path::new(&cli.env).exists() {
        dotenvy::from_filename(&cli.env)?;
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    let mut config = ExtractorConfig::from_env()?;

    let (request, target) = match cli.command {
        Commands::Api { url, auth, target } => {
            if let Some(auth_type) = auth {
                config.auth = Auth::new(
                    &auth_type,
                    std::env::var("TABX_API_USERNAME").ok(),
                    std::env::var("TABX_API_PASSWORD").ok(),
                    std::env::var("TABX_API_KEY")
                        .or_else(|_| std::env::var("TABX_API_TOKEN"))
                        .ok(),
                );
            }
            log::info!("Fetching {} with {} auth", url.bright_black(), config.auth);
            let request = ExtractionRequest::new(SourceKind::Api, &target.entity, &target.date)
                .with_param("url", url.as_str());
            (request, target)
        }
        Commands::Csv {
            path,
            delimiter,
            target,
        } => {
            log::info!("Reading {}", path.display().bright_black());
            let request = ExtractionRequest::new(SourceKind::File, &target.entity, &target.date)
                .with_param("path", path.to_string_lossy())
                .with_param("delimiter", delimiter.to_string());
            (request, target)
        }
        Commands::Request { file, target } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read request file: {}", file.display()))?;
            let request: ExtractionRequest = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse request file: {}", file.display()))?;
            log::info!(
                "Running {} request for {}",
                request.kind().cyan(),
                request.entity().bright_black()
            );
            (request, target)
        }
    };

    let extractor = DataExtractor::from_config(&config)?;
    let source = request.kind();
    let extraction = match &target.cache_name {
        Some(name) => {
            let dir = target
                .cache_dir
                .clone()
                .or_else(|| config.cache_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            extractor
                .run_cached(request, CacheKey::new(name, dir))
                .await?
        }
        None => extractor.run_detailed(request).await?,
    };

    report(source, &extraction);
    write_output(&extraction, target.output.as_deref())
}

fn report(source: SourceKind, extraction: &Extraction) {
    match &extraction.degraded {
        Some(cause) => log::warn!(
            "{} extraction degraded to an empty table: {}",
            source.yellow(),
            cause
        ),
        None => log::info!(
            "Extracted {} row(s), {} column(s) from {}",
            extraction.table.len().cyan(),
            extraction.table.width().cyan(),
            source.green()
        ),
    }
}

fn write_output(extraction: &Extraction, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            tabextract::CsvWriter::new(path)
                .write(&extraction.table)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("✓ Wrote table to {}", path.display().bright_black());
        }
        None => {
            let stdout = std::io::stdout();
            write_table(csv::Writer::from_writer(stdout.lock()), &extraction.table)
                .context("Failed to write table to stdout")?;
        }
    }
    Ok(())
}
