//! trueno-tracker CLI: dashboard server and store inspection.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context};
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trueno_tracker::dashboard;
use trueno_tracker::demo;
use trueno_tracker::experiment::{ExperimentId, ExperimentStore};
use trueno_tracker::inspect::Inspector;
use trueno_tracker::settings::TrackerSettings;
use trueno_tracker::tracker::TrackingSession;

/// Track training experiments and browse them.
#[derive(Parser, Debug)]
#[command(name = "trueno-tracker", version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to ./tracker.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store connection string, overrides settings
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the dashboard
    Serve {
        /// Listen address, overrides settings
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
    /// Print the experiment table
    List,
    /// Print one experiment with its metrics
    Show {
        /// Experiment ID
        id: i64,
    },
    /// Record the four demo experiments with synthetic metrics
    Demo {
        /// Epochs per experiment
        #[arg(short, long, default_value = "10")]
        epochs: u32,

        /// Directory named in the demo configurations
        #[arg(long, default_value = "./root")]
        data_root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings =
        TrackerSettings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(url) = cli.database_url {
        settings.database_url = url;
    }

    match cli.command {
        Commands::Serve { bind } => serve(&settings, bind.unwrap_or(settings.bind)).await,
        Commands::List => {
            let store = open_store(&settings)?;
            let table = Inspector::new(&store).list_experiments()?;
            println!("{}", pretty_format_batches(&[table])?);
            Ok(())
        }
        Commands::Show { id } => show(&settings, ExperimentId::new(id)),
        Commands::Demo { epochs, data_root } => {
            let mut session = TrackingSession::open(&settings)?;
            let recorded = demo::record_demo(&mut session, &data_root, epochs)?;
            println!(
                "Recorded {} experiments into {}",
                recorded.len(),
                settings.database_url
            );
            Ok(())
        }
    }
}

fn open_store(settings: &TrackerSettings) -> anyhow::Result<ExperimentStore> {
    ExperimentStore::open(&settings.database_url)
        .with_context(|| format!("failed to open store {}", settings.database_url))
}

fn show(settings: &TrackerSettings, id: ExperimentId) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let inspector = Inspector::new(&store);
    let Some(details) = inspector.experiment_details(id)? else {
        bail!("experiment {id} not found");
    };
    println!("{details}");

    if let Some(training) = inspector.training_metrics(id)? {
        println!("Training Metrics:\n{}", pretty_format_batches(&[training])?);
    }
    Ok(())
}

async fn serve(settings: &TrackerSettings, bind: SocketAddr) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let app = dashboard::router(dashboard::shared(store));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(%bind, database = %settings.database_url, "dashboard listening");
    axum::serve(listener, app).await?;
    Ok(())
}
