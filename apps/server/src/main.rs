use anyhow::Context;
use clap::{Parser, Subcommand};
use relayhub_auth::{CredentialGate, IssuedCredential};
use relayhub_config::{load as load_config, AppConfig};
use relayhub_database::{initialize_database, BeingRepository};
use relayhub_gateway::{build_router, DeliverySettings, GatewayState};
use relayhub_runtime::{shutdown_signal, telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "relayhub-server")]
#[command(about = "RelayHub real-time message relay (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server with the delivery worker
    Serve,
    /// Create a being and print its credential once
    CreateBeing {
        #[arg(long)]
        org: String,
        #[arg(long)]
        name: String,
    },
    /// Issue a fresh token for a being, invalidating the old one
    RotateToken {
        #[arg(long)]
        being_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::CreateBeing { org, name } => create_being(&config, &org, &name).await,
        Commands::RotateToken { being_id } => rotate_token(&config, &being_id).await,
    }
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    info!("starting RelayHub");

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = GatewayState::new(services.db_pool.clone(), services.log.clone(), &config.relay);
    let consumer = state
        .delivery_worker(DeliverySettings::from_config(&config.stream))
        .start()
        .await
        .context("failed to start delivery worker")?;

    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error");

    consumer.stop().await;
    info!("relay shut down");
    served
}

async fn credential_gate(config: &AppConfig) -> anyhow::Result<CredentialGate> {
    let pool = initialize_database(&config.database)
        .await
        .context("failed to open record store")?;
    Ok(CredentialGate::new(BeingRepository::new(pool)))
}

async fn create_being(config: &AppConfig, org: &str, name: &str) -> anyhow::Result<()> {
    let gate = credential_gate(config).await?;
    let issued = gate
        .provision(org, name)
        .await
        .with_context(|| format!("failed to create being {name} in {org}"))?;
    print_credential(&issued);
    Ok(())
}

async fn rotate_token(config: &AppConfig, being_id: &str) -> anyhow::Result<()> {
    let gate = credential_gate(config).await?;
    let issued = gate
        .rotate(being_id)
        .await
        .with_context(|| format!("failed to rotate token for {being_id}"))?;
    print_credential(&issued);
    Ok(())
}

fn print_credential(issued: &IssuedCredential) {
    println!("being_id: {}", issued.being.id);
    println!("org_id:   {}", issued.being.org_id);
    println!("name:     {}", issued.being.name);
    println!("token:    {}", issued.token);
    println!();
    println!("The token is shown only once. Connect with /ws/{}?token=<token>", issued.being.id);
}
