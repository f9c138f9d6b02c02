use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{fs, path::PathBuf};
use tracing::{error, info, warn, Level};
use vocab_sync::{
    synchronize, Backend, IngestPolicy, ManifestSet, SyncSettings, Template, VocabState,
};

/// Vocabulary synchronizer
/// Loads the vocabularies declared in a data directory into a triple store
/// and writes the matching Skosmos configuration
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output for detailed processing information
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load missing or stale vocabularies and assemble the Skosmos configuration
    Sync {
        /// Directory containing the vocabulary manifests and local sources
        #[arg(short, long, value_name = "DATA DIRECTORY")]
        data: Option<PathBuf>,

        /// SPARQL endpoint of the store (Fuseki dataset or GraphDB repository URL)
        #[arg(short, long, value_name = "URL")]
        endpoint: Option<String>,

        /// Store product behind the endpoint (fuseki/graphdb)
        #[arg(short, long)]
        backend: Option<Backend>,

        /// Path of the generated Skosmos configuration
        #[arg(short, long, value_name = "OUTPUT PATH")]
        output: Option<PathBuf>,

        /// Keep going when the store rejects a vocabulary upload
        #[arg(long)]
        lenient: bool,

        /// Seconds to wait before contacting the store
        #[arg(short, long, value_name = "SECONDS")]
        wait: Option<u64>,
    },
    /// Check every manifest in the data directory without contacting any server
    Validate {
        /// Directory containing the vocabulary manifests
        #[arg(short, long, value_name = "DATA DIRECTORY")]
        data: Option<PathBuf>,
    },
    /// Generate a manifest template
    GenerateManifest {
        /// Type of manifest template to generate (file/fetch/sparql)
        #[arg(short = 't', long = "type", default_value = "file")]
        template_type: String,

        /// Output path for the generated manifest
        #[arg(
            short,
            long,
            default_value = "vocabulary.yaml",
            value_name = "OUTPUT PATH"
        )]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with appropriate level
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Vocabulary synchronizer starting up...");

    match cli.command {
        Commands::Sync {
            data,
            endpoint,
            backend,
            output,
            lenient,
            wait,
        } => {
            let mut settings = load_settings()?;
            if let Some(data) = data {
                settings.data = data;
            }
            if let Some(endpoint) = endpoint {
                settings.sparql_endpoint = endpoint;
            }
            if let Some(backend) = backend {
                settings.database_type = backend;
            }
            if let Some(output) = output {
                settings.config_output = output;
            }
            if lenient {
                settings.ingest_policy = IngestPolicy::BestEffort;
            }
            if let Some(wait) = wait {
                settings.startup_delay = wait;
            }
            sync_command(&settings).await
        }
        Commands::Validate { data } => {
            let data = match data {
                Some(data) => data,
                None => load_settings()?.data,
            };
            validate_command(&data)
        }
        Commands::GenerateManifest {
            template_type,
            output,
        } => generate_manifest_command(&template_type, &output),
    }
}

fn load_settings() -> Result<SyncSettings> {
    SyncSettings::load().context("Failed to read configuration from vocab-sync.* and environment")
}

async fn sync_command(settings: &SyncSettings) -> Result<()> {
    info!(
        "Synchronizing {} against {:?} store at {}",
        settings.data.display(),
        settings.database_type,
        settings.sparql_endpoint
    );

    let report = synchronize(settings)
        .await
        .context("Vocabulary synchronization aborted")?;

    for outcome in report.outcomes() {
        match &outcome.state {
            VocabState::Failed(reason) => warn!("{}: FAILED ({})", outcome.id, reason),
            state => info!("{}: {:?}", outcome.id, state),
        }
        for warning in &outcome.warnings {
            warn!("{}: {}", outcome.id, warning.message);
        }
    }

    info!(
        "Wrote configuration for {} vocabularies to {}",
        report.appended().len(),
        settings.config_output.display()
    );
    Ok(())
}

fn validate_command(data: &PathBuf) -> Result<()> {
    info!("Validating manifests in {}...", data.display());

    let manifests = ManifestSet::discover(data)
        .context(format!("Failed to read data directory: {}", data.display()))?;

    let mut invalid = 0;
    for entry in manifests.entries() {
        match entry.load().and_then(|manifest| manifest.validate()) {
            Ok(()) => info!("{}: OK", entry.id),
            Err(e) => {
                invalid += 1;
                error!("{}: {}", entry.id, e);
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} of {} manifests are invalid", invalid, manifests.len());
    }
    info!("All {} manifests are valid", manifests.len());
    Ok(())
}

fn generate_manifest_command(template_type: &str, output: &PathBuf) -> Result<()> {
    let template: Template = template_type.parse()?;

    info!("Generating {} manifest template...", template_type);

    // if output is a directory, append the default file name
    let full_file_output_path = if output.is_dir() {
        output.join("vocabulary.yaml")
    } else {
        output.into()
    };

    fs::write(&full_file_output_path, template.content())
        .context(format!("Failed to write manifest to: {}", output.display()))?;

    info!(
        "Successfully generated manifest template at: {}",
        full_file_output_path.display()
    );
    Ok(())
}
