use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use geocode_memo::{
    config::{Config, LogFormat},
    correction::{Corrector, Lexicon, NoCorrection},
    memo::Memo,
    table, Locator, NominatimClient, Resolver, ResolverSettings,
};

/// Geocode the location column of a CSV file through Nominatim.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input CSV (takes precedence over GEOCODE_INPUT_PATH)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output CSV (takes precedence over GEOCODE_OUTPUT_PATH)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Column holding the location text (takes precedence over LOCATION_COLUMN)
    #[arg(long)]
    column: Option<String>,

    /// Memo file (overrides MEMO_PATH)
    #[arg(long)]
    memo: Option<PathBuf>,

    /// Run a single pass without reading or writing the memo
    #[arg(long)]
    no_memo: bool,

    /// Enable the spelling-correction fallbacks
    #[arg(long)]
    autocorrect: bool,

    /// Corrections lexicon JSON (overrides CORRECTIONS_PATH)
    #[arg(long)]
    corrections: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    apply_overrides(&mut config, cli);
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        input = %config.batch.input_path.display(),
        user_agents = config.geocoder.user_agents.len(),
        "Geocode memo starting..."
    );
    for warning in &config.warnings {
        warn!("{}", warning);
    }

    let queries = table::read_queries(&config.batch.input_path, &config.batch.location_column)
        .map_err(|e| {
            error!(error = %e, "Failed to read input");
            e
        })?;

    let memo = if config.memo.enabled {
        match Memo::load(&config.memo.path) {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "Memo unavailable");
                return Err(e.into());
            }
        }
    } else {
        Memo::in_memory()
    };

    let geocoder = match NominatimClient::new(&config.geocoder, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %c.base_url(), "Nominatim client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Nominatim client");
            return Err(e.into());
        }
    };

    let corrector = load_corrector(&config)?;

    let settings = ResolverSettings {
        use_memo: config.memo.enabled,
        use_autocorrect: config.correction.enabled,
        save_threshold: config.memo.save_threshold,
    };
    let first_agent = config.geocoder.user_agents.first().cloned().unwrap_or_default();
    let resolver = Resolver::new(geocoder, corrector, memo, settings, first_agent);
    let mut locator = Locator::new(resolver, config.geocoder.user_agents.clone());

    let outcome = locator.run(&queries).await?;

    table::write_rows(
        &config.batch.output_path,
        &config.batch.location_column,
        &outcome.rows,
    )?;

    info!(
        passes = outcome.passes.len(),
        resolved = outcome.rows.iter().filter(|r| r.is_resolved()).count(),
        rows = outcome.rows.len(),
        output = %config.batch.output_path.display(),
        "Geocode memo finished"
    );
    Ok(())
}

fn apply_overrides(config: &mut Config, cli: Cli) {
    if let Some(input) = cli.input {
        config.batch.input_path = input;
    }
    if let Some(output) = cli.output {
        config.batch.output_path = output;
    }
    if let Some(column) = cli.column {
        config.batch.location_column = column;
    }
    if let Some(memo) = cli.memo {
        config.memo.path = memo;
    }
    if cli.no_memo {
        config.memo.enabled = false;
    }
    if cli.autocorrect {
        config.correction.enabled = true;
    }
    if let Some(corrections) = cli.corrections {
        config.correction.lexicon_path = Some(corrections);
    }
}

fn load_corrector(config: &Config) -> anyhow::Result<Box<dyn Corrector>> {
    if !config.correction.enabled {
        return Ok(Box::new(NoCorrection));
    }
    match &config.correction.lexicon_path {
        Some(path) => {
            let lexicon = Lexicon::load(path)?;
            info!(path = %path.display(), entries = lexicon.len(), "Corrections lexicon loaded");
            Ok(Box::new(lexicon))
        }
        None => {
            warn!("Autocorrect enabled without CORRECTIONS_PATH, corrections will be no-ops");
            Ok(Box::new(NoCorrection))
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
