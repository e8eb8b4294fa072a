use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pledge_core::adapters::PostgresTransactionRepository;
use pledge_core::cli::{self, Cli, Commands, DbCommands, TxCommands};
use pledge_core::config::Config;
use pledge_core::health::{DependencyChecker, PayPalChecker, TransactionStoreChecker};
use pledge_core::paypal::PayPalClient;
use pledge_core::ports::{PaymentProvider, TransactionRepository};
use pledge_core::secrets::SecretsManager;
use pledge_core::services::PaymentVerificationService;
use pledge_core::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config().await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
        Commands::Tx(command) => {
            let pool = db::create_pool(&config)
                .await
                .context("failed to connect to database")?;
            let repository = Arc::new(PostgresTransactionRepository::new(pool));

            match command {
                TxCommands::Show { tx_id } => cli::handle_tx_show(repository.as_ref(), tx_id).await,
                TxCommands::Create { total_amount } => {
                    cli::handle_tx_create(repository.as_ref(), total_amount).await
                }
                TxCommands::Verify { order_id } => {
                    let provider = Arc::new(PayPalClient::new(config.paypal.clone())?);
                    let service = PaymentVerificationService::new(provider, repository);
                    cli::handle_tx_verify(&service, &order_id).await
                }
            }
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Environment configuration, with the PayPal client secret taken from Vault
/// when AppRole credentials are present.
async fn load_config() -> anyhow::Result<Config> {
    let config = Config::from_env()?;

    if !SecretsManager::is_configured() {
        return Ok(config);
    }

    let secrets = SecretsManager::new().await?;
    let secret = secrets.get_paypal_client_secret().await?;
    tracing::info!("PayPal client secret loaded from Vault");

    let config = config.with_paypal_secret(secret);
    if !config.paypal.has_client_secret() {
        anyhow::bail!("PayPal client secret read from Vault is empty");
    }
    Ok(config)
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config)
        .await
        .context("failed to connect to database")?;
    db::run_migrations(&pool).await?;

    let transactions: Arc<dyn TransactionRepository> =
        Arc::new(PostgresTransactionRepository::new(pool));

    let paypal: Arc<dyn PaymentProvider> = Arc::new(PayPalClient::new(config.paypal.clone())?);
    tracing::info!(base_url = %config.paypal.base_url, "PayPal client initialized");

    let checkers: Vec<Arc<dyn DependencyChecker>> = vec![
        Arc::new(TransactionStoreChecker::new(transactions.clone())),
        Arc::new(PayPalChecker::new(paypal.clone())),
    ];

    let state = AppState {
        verifier: Arc::new(PaymentVerificationService::new(paypal, transactions.clone())),
        transactions,
        checkers,
        start_time: Instant::now(),
    };

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
