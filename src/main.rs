use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fulfillment::api::{self, AppState};
use fulfillment::clients::{
    DisabledOrderTransfer, HttpNotificationSender, HttpOrderTransfer, HttpRightsAuthority,
    HttpStockEventSubmitter, OrderTransfer, ServiceClient,
};
use fulfillment::clock::{Clock, SystemClock};
use fulfillment::config::{Settings, StorageBackend};
use fulfillment::metrics::{self, Metrics};
use fulfillment::permissions::PermissionService;
use fulfillment::repository::{MemoryStore, OrderRepository, PgStore, ProofOfDeliveryRepository};
use fulfillment::workflow::{
    ConfirmationHook, NotificationHook, OrderWorkflow, ProofOfDeliveryWorkflow, StockEventHook,
};

type Stores = (Arc<dyn OrderRepository>, Arc<dyn ProofOfDeliveryRepository>);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fulfillment=debug"))
        )
        .init();

    tracing::info!("🚀 Starting fulfillment service");

    // === 1. Configuration ===
    Settings::load_env_file()?;
    let settings = Settings::load()?;
    let transitions = Arc::new(settings.transitions()?);

    let metrics = Arc::new(Metrics::new()?);

    // === 2. Storage ===
    let (orders, pods) = open_storage(&settings).await?;

    // === 3. Collaborating services ===
    let breaker = settings.circuit_breaker();
    let timeout = settings.service_timeout();
    let client = |name: &str, url: &str| {
        ServiceClient::new(name, url, timeout, breaker.clone(), metrics.clone())
    };

    let rights = Arc::new(HttpRightsAuthority::new(client(
        "reference-data",
        &settings.services.reference_data_url,
    )?));
    let stock_events = Arc::new(HttpStockEventSubmitter::new(client(
        "stock-management",
        &settings.services.stock_management_url,
    )?));
    let notifications = Arc::new(HttpNotificationSender::new(client(
        "notification",
        &settings.services.notification_url,
    )?));
    let transfer: Arc<dyn OrderTransfer> = match &settings.services.transfer_url {
        Some(url) => Arc::new(HttpOrderTransfer::new(client("transfer", url)?)),
        None => {
            tracing::warn!("⚠️ No transfer endpoint configured, order retries will always fail");
            Arc::new(DisabledOrderTransfer)
        }
    };

    // === 4. Workflows ===
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let permissions = PermissionService::new(rights, metrics.clone());

    let order_workflow = Arc::new(OrderWorkflow::new(
        orders.clone(),
        permissions.clone(),
        transfer,
        transitions,
        clock.clone(),
        metrics.clone(),
    ));

    let hooks: Vec<Arc<dyn ConfirmationHook>> = vec![
        Arc::new(StockEventHook::new(stock_events)),
        Arc::new(NotificationHook::new(notifications)),
    ];
    let pod_workflow = Arc::new(ProofOfDeliveryWorkflow::new(
        pods,
        orders,
        order_workflow.clone(),
        permissions,
        hooks,
        clock,
        metrics.clone(),
    ));

    let state = AppState { orders: order_workflow, pods: pod_workflow };

    // === 5. HTTP server ===
    let bind = (settings.server.host.clone(), settings.server.port);
    tracing::info!(host = %settings.server.host, port = settings.server.port, "🌐 Listening");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .route("/health", web::get().to(metrics::health_handler))
            .route("/metrics", web::get().to(metrics::metrics_handler))
            .configure(api::configure)
    })
    .bind(bind)?
    .run()
    .await?;

    tracing::info!("👋 Fulfillment service stopped");
    Ok(())
}

async fn open_storage(settings: &Settings) -> anyhow::Result<Stores> {
    match settings.storage.backend {
        StorageBackend::Postgres => {
            tracing::info!("Connecting to PostgreSQL...");
            let store = PgStore::connect(&settings.database.url, settings.database.max_connections).await?;
            store.migrate().await?;
            tracing::info!("✅ Database ready");
            let orders: Arc<dyn OrderRepository> = Arc::new(store.clone());
            let pods: Arc<dyn ProofOfDeliveryRepository> = Arc::new(store);
            Ok((orders, pods))
        }
        StorageBackend::Memory => {
            tracing::warn!("⚠️ Using in-memory storage, data is lost on shutdown");
            let store = MemoryStore::new();
            let orders: Arc<dyn OrderRepository> = Arc::new(store.clone());
            let pods: Arc<dyn ProofOfDeliveryRepository> = Arc::new(store);
            Ok((orders, pods))
        }
    }
}
