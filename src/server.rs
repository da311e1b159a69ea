//! Server runtime
//!
//! [`ServerHandle`] owns the whole lifecycle: database and migrations,
//! cache and event channels, the notification dispatcher, the REST API,
//! metrics and graceful shutdown. [`run_relay_mode`] runs the broker
//! relay consumer instead of the API.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::{
    BlogService, EventChannel, NotificationDispatcher, TariffCache, TariffService,
};
use crate::config::{AppConfig, CacheBackend};
use crate::domain::{NewUser, UserRepository, UserRole};
use crate::infrastructure::crypto::jwt::JwtConfig;
use crate::infrastructure::crypto::password::hash_password;
use crate::infrastructure::database::repositories::{
    SeaOrmBlogRepository, SeaOrmTariffRepository, SeaOrmUserRepository,
};
use crate::infrastructure::messaging::run_relay;
use crate::infrastructure::{
    init_database, run_migrations, InMemoryTariffCache, KafkaLogPublisher, NoopChannel,
    RabbitFanoutPublisher, RedisTariffCache,
};
use crate::interfaces::http::{create_api_router, RouterDeps};
use crate::shared::{ShutdownCoordinator, ShutdownSignal};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ── Options ────────────────────────────────────────────────────────

pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
    /// Create the default admin user if no user exists (default: true).
    pub create_default_admin: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
            create_default_admin: true,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running tariff service.
///
/// ```rust,no_run
/// use tariff_service::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub tariffs: Arc<TariffService>,
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// Port actually bound (differs from the configured one when that is 0).
    pub api_port: u16,

    db: DatabaseConnection,
    notifier: Arc<NotificationDispatcher>,
    shutdown: ShutdownCoordinator,
    api_task: JoinHandle<()>,
}

impl ServerHandle {
    /// Start the service:
    /// 1. Install the Prometheus recorder
    /// 2. Connect to the database, run migrations, seed the admin user
    /// 3. Connect the cache and both event channels
    /// 4. Serve the REST API (with Swagger UI)
    pub async fn start(opts: ServerOptions) -> Result<Self, BoxError> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting tariff service...");

        let prometheus_handle = prometheus_handle();

        // ── Database ───────────────────────────────────────────
        let db = init_database(&app_cfg.database).await?;

        if opts.auto_migrate {
            info!("Running database migrations...");
            run_migrations(&db).await?;
            info!("Migrations completed");
        }

        let users: Arc<dyn UserRepository> = Arc::new(SeaOrmUserRepository::new(db.clone()));
        if opts.create_default_admin {
            create_default_admin(users.as_ref(), &app_cfg).await;
        }

        // ── Cache & channels ───────────────────────────────────
        let cache = build_cache(&app_cfg).await?;
        let (log_channel, fanout_channel) = build_channels(&app_cfg).await?;

        let options = app_cfg.notifications.dispatcher_options();
        info!(
            mode = ?options.mode,
            queue_capacity = options.queue_capacity,
            "🔔 Notification dispatcher ready"
        );
        let notifier = Arc::new(NotificationDispatcher::new(
            log_channel,
            fanout_channel,
            options,
        ));

        // ── Services ───────────────────────────────────────────
        let repo = Arc::new(SeaOrmTariffRepository::new(db.clone()));
        let tariffs = Arc::new(TariffService::new(repo, cache.clone(), notifier.clone()));
        let blogs = Arc::new(BlogService::new(Arc::new(SeaOrmBlogRepository::new(
            db.clone(),
        ))));

        let jwt_config = JwtConfig::from(&app_cfg.security);
        info!(
            "JWT configured with {}h token expiration",
            jwt_config.expiration_hours
        );

        // ── REST API server ────────────────────────────────────
        let api_router = create_api_router(RouterDeps {
            db: db.clone(),
            tariffs: tariffs.clone(),
            blogs,
            cache,
            users,
            jwt_config,
            bcrypt_cost: app_cfg.security.bcrypt_cost,
            cors_origins: app_cfg.server.cors_origins.clone(),
            prometheus: prometheus_handle,
        });

        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);

        let api_addr = app_cfg.api_address();
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("REST API server listening on http://{}", local_addr);
        info!("Swagger UI available at http://{}/docs/", local_addr);

        let api_shutdown = shutdown.signal();
        let api_server = axum::serve(
            listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("🛑 REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        info!("🚀 Tariff service started.");

        Ok(Self {
            tariffs,
            config: app_cfg,
            api_port: local_addr.port(),
            db,
            notifier,
            shutdown,
            api_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown without waiting for it.
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the API to stop, then drain pending notifications and
    /// close the database, within `server.shutdown_timeout`.
    pub async fn wait(self) {
        info!("⏳ Waiting for server tasks to complete...");

        match self.api_task.await {
            Ok(()) => info!("REST API server stopped"),
            Err(e) => error!("REST API server task panicked: {}", e),
        }

        let notifier = self.notifier;
        let db = self.db;
        self.shutdown
            .shutdown_with_cleanup(|| async move {
                notifier.shutdown().await;
                if let Err(e) = db.close().await {
                    warn!("Error closing database connection: {}", e);
                } else {
                    info!("✅ Database connection closed");
                }
            })
            .await;

        info!("👋 Tariff service shutdown complete");
    }

    pub async fn shutdown(self) {
        info!("🛑 Shutting down tariff service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

// ── Relay mode ─────────────────────────────────────────────────────

/// Forward acknowledgements of every exchange event to the Kafka relay
/// topic until SIGINT/SIGTERM.
pub async fn run_relay_mode(config: AppConfig) -> Result<(), BoxError> {
    config.validate()?;

    let kafka = Arc::new(KafkaLogPublisher::connect(&config.kafka).await?);
    kafka
        .ensure_topic(&config.kafka.relay_topic, config.kafka.replication_factor)
        .await?;

    let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout);
    shutdown.start_signal_listener();

    info!("🚀 Relay started. Press Ctrl+C to stop.");
    run_relay(
        &config.rabbit,
        kafka,
        &config.kafka.relay_topic,
        shutdown.signal(),
    )
    .await?;

    info!("👋 Relay stopped");
    Ok(())
}

// ── Helpers ────────────────────────────────────────────────────────

/// The global recorder can be installed once per process; later starts
/// in the same process reuse it.
fn prometheus_handle() -> Option<PrometheusHandle> {
    static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

    PROM_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("📊 Prometheus metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                warn!("Prometheus recorder unavailable, /metrics disabled: {}", e);
                None
            }
        })
        .clone()
}

async fn build_cache(config: &AppConfig) -> Result<Arc<dyn TariffCache>, BoxError> {
    match config.cache.backend {
        CacheBackend::Redis => {
            let cache = RedisTariffCache::connect(&config.cache.url).await?;
            info!("Cache: Redis at {}", config.cache.url);
            Ok(Arc::new(cache))
        }
        CacheBackend::Memory => {
            info!("Cache: in-process");
            Ok(Arc::new(InMemoryTariffCache::new()))
        }
    }
}

/// Kafka must be reachable at startup. RabbitMQ reconnects on demand, so
/// an unreachable broker is only a warning.
async fn build_channels(
    config: &AppConfig,
) -> Result<(Arc<dyn EventChannel>, Arc<dyn EventChannel>), BoxError> {
    let log: Arc<dyn EventChannel> = if config.kafka.enabled {
        Arc::new(KafkaLogPublisher::connect(&config.kafka).await?)
    } else {
        info!("Kafka channel disabled");
        Arc::new(NoopChannel::new("kafka"))
    };

    let fanout: Arc<dyn EventChannel> = if config.rabbit.enabled {
        let publisher = RabbitFanoutPublisher::new(&config.rabbit);
        if let Err(e) = publisher.connect().await {
            warn!("RabbitMQ not reachable yet, will retry on publish: {}", e);
        }
        Arc::new(publisher)
    } else {
        info!("RabbitMQ channel disabled");
        Arc::new(NoopChannel::new("rabbitmq"))
    };

    Ok((log, fanout))
}

/// Create the configured admin account when the user table is empty.
async fn create_default_admin(users: &dyn UserRepository, app_cfg: &AppConfig) {
    let users_count = match users.count().await {
        Ok(n) => n,
        Err(e) => {
            error!("Failed to count users: {}", e);
            return;
        }
    };
    if users_count > 0 {
        return;
    }

    info!("Creating default admin user...");

    let password_hash = match hash_password(&app_cfg.admin.password, app_cfg.security.bcrypt_cost)
    {
        Ok(hash) => hash,
        Err(e) => {
            error!("Failed to hash admin password: {}", e);
            return;
        }
    };

    match users
        .create(NewUser {
            username: app_cfg.admin.username.clone(),
            email: app_cfg.admin.email.clone(),
            password_hash,
            role: UserRole::Admin,
        })
        .await
    {
        Ok(admin) => {
            info!("Default admin created: {}", admin.username);
            info!("⚠️  Please change the admin password immediately!");
        }
        Err(e) => error!("Failed to create admin user: {}", e),
    }
}

/// Initialize tracing from the application config. `RUST_LOG` takes
/// precedence over `logging.level`. Call once at process startup.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
