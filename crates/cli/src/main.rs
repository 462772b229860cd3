use std::path::PathBuf;

use anyhow::Context;
use bson::Bson;
use clap::{Parser, Subcommand};
use delivery_db::MongoStore;
use delivery_init::modules::deliveries::seed;
use delivery_init::{BootstrapPlan, COMPLETION_MESSAGE};
use delivery_kernel::settings::{RerunPolicy, Settings};

#[derive(Debug, Parser)]
#[command(name = "delivery-init", version, about = "Initialize the delivery database")]
struct Cli {
    /// MongoDB connection string (overrides MONGO_URI and settings)
    #[arg(long, global = true)]
    uri: Option<String>,

    /// Target database name
    #[arg(long, global = true)]
    database: Option<String>,

    /// Target collection name
    #[arg(long, global = true)]
    collection: Option<String>,

    /// What to do when the collection already exists: fail or skip
    #[arg(long, global = true)]
    on_existing: Option<RerunPolicy>,

    /// Directory holding base.toml and <environment>.toml
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Create the collection, seed data, indexes and application user (default)
    Init,
    /// Check an initialized database against the configured plan
    Verify,
    /// Print the seed documents as JSON without connecting
    Seed,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(uri) = &self.uri {
            settings.database.uri = uri.clone();
        }
        if let Some(database) = &self.database {
            settings.database.name = database.clone();
        }
        if let Some(collection) = &self.collection {
            settings.database.collection = collection.clone();
        }
        if let Some(on_existing) = self.on_existing {
            settings.bootstrap.on_existing = on_existing;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_with_dir(cli.config_dir.as_deref())
        .with_context(|| "failed to load delivery-init settings")?;
    cli.apply(&mut settings);

    delivery_telemetry::init(&settings.telemetry).with_context(|| "failed to initialize logging")?;

    tracing::debug!(env = ?settings.environment, "settings loaded");

    match cli.command.unwrap_or(Command::Init) {
        Command::Init => init(&settings).await,
        Command::Verify => verify(&settings).await,
        Command::Seed => print_seed(&settings),
    }
}

async fn init(settings: &Settings) -> anyhow::Result<()> {
    let plan = BootstrapPlan::from_settings(settings)?;

    let store = MongoStore::connect(&settings.database)
        .await
        .with_context(|| format!("failed to connect to database '{}'", settings.database.name))?;

    let report = delivery_init::run(&store, &plan, chrono::Utc::now()).await?;

    if report.skipped {
        println!(
            "collection '{}.{}' already exists, nothing to do",
            report.database, report.collection
        );
    } else {
        println!("{}", COMPLETION_MESSAGE);
    }

    Ok(())
}

async fn verify(settings: &Settings) -> anyhow::Result<()> {
    let plan = BootstrapPlan::from_settings(settings)?;

    let store = MongoStore::connect(&settings.database)
        .await
        .with_context(|| format!("failed to connect to database '{}'", settings.database.name))?;

    let report = delivery_init::verify(&store, &plan).await?;
    for line in report.lines() {
        println!("{}", line);
    }

    report.ensure_ok(&settings.database.name)
}

fn print_seed(settings: &Settings) -> anyhow::Result<()> {
    let records = seed::resolve_seed(settings.seed.path.as_deref())?;
    let now = chrono::Utc::now();

    let documents = records
        .iter()
        .map(|record| -> anyhow::Result<serde_json::Value> {
            let delivery = record.materialize(now)?;
            let document = delivery.to_document().context("failed to encode seed deliveries")?;
            Ok(Bson::Document(document).into_relaxed_extjson())
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    println!("{}", serde_json::to_string_pretty(&documents)?);
    Ok(())
}
