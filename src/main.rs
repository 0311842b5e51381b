use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use geoplan::client::{FusionBackend, HttpBackend};
use geoplan::common;
use geoplan::sync::ConfigSession;
use geoplan::wire::{self, WireConfig};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the built-in default configuration to a YAML file
    Init {
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Load a configuration and check it against the model invariants
    Validate {
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Print the wire-format projection of a configuration
    Wire {
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
        /// Output format: yaml or json
        #[clap(short, long, default_value = "yaml")]
        format: String,
    },
    /// Validate and submit a configuration to the analysis backend
    Submit {
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
        #[clap(short, long)]
        endpoint: String,
    },
    /// List the backend's file catalog
    Files {
        #[clap(short, long)]
        endpoint: String,
    },
}

fn load_session(path: &str) -> Result<ConfigSession> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration from {}", path))?;
    let wire_config: WireConfig =
        serde_yaml::from_str(&content).with_context(|| format!("parsing {}", path))?;
    let config = wire::from_wire(wire_config)?;
    Ok(ConfigSession::with_config(config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Init { config } => {
            info!("Writing default configuration to {}", config);
            let session = ConfigSession::new();
            let serialized = serde_yaml::to_string(&wire::to_wire(session.config()))?;
            common::write_string_to_file(&config, &serialized)?;
        }
        Commands::Validate { config } => {
            let session = load_session(&config)?;
            session.config().validate()?;
            info!("Configuration {} is valid", config);
            println!("ok");
        }
        Commands::Wire { config, format } => {
            let session = load_session(&config)?;
            let wire_config = wire::to_wire(session.config());
            let rendered = match format.as_str() {
                "json" => serde_json::to_string_pretty(&wire_config)?,
                "yaml" => serde_yaml::to_string(&wire_config)?,
                other => anyhow::bail!("unsupported format: {}", other),
            };
            println!("{}", rendered);
        }
        Commands::Submit { config, endpoint } => {
            let session = load_session(&config)?;
            let wire_config = session.submit_config()?;
            info!(
                "Submitting {} (variant {})",
                config,
                session.config().buffer_layer.variant_key()
            );
            let backend = HttpBackend::new(endpoint);
            let response = backend.submit(&wire_config).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Files { endpoint } => {
            let backend = HttpBackend::new(endpoint);
            let catalog = backend.list_files().await?;
            for (name, path) in &catalog {
                println!("{}: {}", name, path);
            }
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .without_time()
        .init();
}
