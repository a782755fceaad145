//! songlake CLI
//!
//! One no-argument run performs the catalog stage, then the event
//! stage, then releases the session. The flags only override the base
//! URLs and the credentials file path.

use clap::Parser;
use songlake::config::Credentials;
use songlake::{pipeline, EtlConfig, EtlSession, Result};

#[derive(Parser, Debug)]
#[command(name = "songlake", version, about = "Song-play data lake ETL")]
struct Cli {
    /// Base URL holding song_data/ and log_data/
    #[arg(long, default_value = "s3://music-app-data/")]
    input: String,

    /// Base URL receiving the output tables
    #[arg(long, default_value = "s3://music-app-lake/")]
    output: String,

    /// Credentials file (INI-style key/value)
    #[arg(long, default_value = songlake::config::DEFAULT_CREDENTIALS_FILE)]
    config: String,
}

async fn run(cli: Cli) -> Result<()> {
    let config = EtlConfig::new(cli.input, cli.output).with_credentials_path(cli.config);

    // Credentials must be in the environment before any S3 client is
    // built; local-only runs don't need them
    if config.needs_credentials() {
        Credentials::load(&config.credentials_path)?.export_to_env();
    }

    let session = EtlSession::create(&config)?;
    let result = pipeline::run(&session).await;
    session.close();
    result
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
