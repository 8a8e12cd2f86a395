use std::net::SocketAddr;

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use classifieds_suite::{
    ApiClient, ApiResponse, Normalized,
    config::{SuiteConfig, load_config},
    fixtures::unique_seller_id,
    harness::stub::{self, CreateShape, StubState},
    model::{NewItem, Statistics},
    scenario::SmokeRun,
};
use serde_json::Value;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "classifieds-suite",
    version,
    about = "Regression checks for the classifieds items API"
)]
struct Cli {
    /// Path to the configuration file (defaults to config/suite.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<Utf8PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an item and print the resolved record
    Create(CreateArgs),
    /// Fetch an item by id
    GetItem { id: String },
    /// List a seller's items
    SellerItems { seller: String },
    /// Fetch an item's statistics
    Statistic { id: String },
    /// Run the end-to-end smoke pass against the configured API
    Smoke(SmokeArgs),
    /// Serve the in-process stub API
    Stub(StubArgs),
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Seller id (random within the configured range when omitted)
    #[arg(long)]
    seller_id: Option<i64>,
    #[arg(long, default_value = "testItem")]
    name: String,
    #[arg(long, default_value_t = 9900)]
    price: i64,
    #[arg(long, default_value_t = 21)]
    likes: i64,
    #[arg(long, default_value_t = 11)]
    view_count: i64,
    #[arg(long, default_value_t = 43)]
    contacts: i64,
}

#[derive(Args, Debug)]
struct SmokeArgs {
    /// Append observations as JSON lines to this file
    #[arg(long, value_name = "PATH")]
    artifacts: Option<Utf8PathBuf>,
}

#[derive(Args, Debug)]
struct StubArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
    /// Shape of the create-item response
    #[arg(long, value_enum, default_value_t = CreateShape::Status)]
    shape: CreateShape,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Stub(args) => serve_stub(args).await,
        command => tokio::task::spawn_blocking(move || run_blocking(command, &config))
            .await
            .context("command task panicked")?,
    }
}

fn run_blocking(command: Command, config: &SuiteConfig) -> Result<()> {
    let client = ApiClient::new(&config.api);
    match command {
        Command::Create(args) => create_cli(&client, config, args),
        Command::GetItem { id } => print_response(client.get_item(&id)?),
        Command::SellerItems { seller } => print_response(client.seller_items(&seller)?),
        Command::Statistic { id } => print_response(client.statistic(&id)?),
        Command::Smoke(args) => smoke_cli(&client, config, args),
        Command::Stub(_) => bail!("stub runs on the async runtime"),
    }
}

fn create_cli(client: &ApiClient, config: &SuiteConfig, args: CreateArgs) -> Result<()> {
    let new_item = NewItem {
        seller_id: args
            .seller_id
            .unwrap_or_else(|| unique_seller_id(&config.sellers)),
        name: args.name,
        price: args.price,
        statistics: Statistics {
            likes: args.likes,
            view_count: args.view_count,
            contacts: args.contacts,
        },
    };
    let payload = serde_json::to_value(&new_item).context("failed to encode item")?;
    let normalized = client.create_and_normalize(&payload)?;
    match &normalized {
        Normalized::Fetched(_) => info!("record resolved by lookup"),
        Normalized::Direct(_) => info!("record returned by create"),
        Normalized::Fallback { reason, .. } => warn!(?reason, "record could not be resolved"),
    }
    println!("{}", serde_json::to_string_pretty(&normalized.into_value())?);
    Ok(())
}

fn smoke_cli(client: &ApiClient, config: &SuiteConfig, args: SmokeArgs) -> Result<()> {
    let seller_id = unique_seller_id(&config.sellers);
    let mut run = SmokeRun::new(client, seller_id);
    if let Some(path) = args.artifacts {
        run = run.record_to(path.into_std_path_buf());
    }
    let report = run.run()?;
    for observation in &report.observations {
        println!(
            "[{}] {:<13} status={:?} {}",
            if observation.ok { "ok" } else { "FAIL" },
            observation.step,
            observation.status,
            observation.detail
        );
    }
    if !report.passed() {
        bail!(
            "smoke run failed: {} step(s) did not pass",
            report.failures().count()
        );
    }
    Ok(())
}

fn print_response(response: ApiResponse) -> Result<()> {
    println!("{} {} -> {}", response.method, response.url, response.status);
    match response.json() {
        Ok(body) => println!("{}", pretty(&body)),
        Err(_) => println!("{}", response.text),
    }
    Ok(())
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

async fn serve_stub(args: StubArgs) -> Result<()> {
    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(addr = %args.listen, shape = ?args.shape, "stub API listening");
    axum::serve(listener, stub::router(StubState::new(args.shape)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("stub server exited with an error")
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(?err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
