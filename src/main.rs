use std::error::Error;
use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::Parser;

use tabular_session::config::CoreConfig;
use tabular_session::ingestion::preview;
use tabular_session::session::SessionStore;
use tabular_session::telemetry::init_tracing;
use tabular_session::upload::{upload, UploadOptions};

/// Ingest a tabular file into a fresh session and print what was stored
#[derive(Parser, Debug)]
#[command(name = "tabular-session")]
#[command(version)]
struct Cli {
    /// File to ingest (.csv, .xlsx, .xls, .xlsm, .xlsb, .ods)
    file: PathBuf,

    /// Text encoding of a CSV (e.g. utf-8, latin-1, windows-1252); detected when omitted
    #[arg(long)]
    encoding: Option<String>,

    /// Read only the first N rows
    #[arg(long, value_parser = positive())]
    sample_rows: Option<usize>,

    /// Rows per chunk when reading large CSVs
    #[arg(long, value_parser = positive())]
    chunk_size: Option<usize>,

    /// Client identity to own the session
    #[arg(long, default_value = "local")]
    owner: String,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the first rows instead of creating a session
    #[arg(long)]
    preview: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

/// Row counts given on the command line must be at least 1.
fn positive() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::<usize>::new().range(1..)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let config = match &cli.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };

    let bytes = std::fs::read(&cli.file)?;
    let filename = cli
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if cli.preview {
        let p = preview(&filename, &bytes, cli.sample_rows, cli.encoding.as_deref())?;
        println!("{}", serde_json::to_string_pretty(&p)?);
        return Ok(());
    }

    let mut options = UploadOptions::from_config(&config);
    options.ingestion.sample_rows = cli.sample_rows;
    if let Some(chunk_size) = cli.chunk_size {
        options.ingestion.chunk_size = chunk_size;
    }

    let store = SessionStore::new(config.sessions);
    let outcome = upload(&store, &cli.owner, &filename, &bytes, cli.encoding.as_deref(), &options)?;
    let record = store.get(&outcome.session_id, &cli.owner)?;

    let report = serde_json::json!({
        "upload": outcome,
        "session": record,
        "live_sessions": store.len(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_row_counts_are_rejected() {
        assert!(Cli::try_parse_from(["tabular-session", "a.csv", "--chunk-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["tabular-session", "a.csv", "--sample-rows", "0"]).is_err());

        let cli = Cli::try_parse_from(["tabular-session", "a.csv", "--chunk-size", "250"]).unwrap();
        assert_eq!(cli.chunk_size, Some(250));
    }
}
