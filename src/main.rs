use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use village_match::config::{LoggingSettings, Settings, StoreBackend};
use village_match::core::Matcher;
use village_match::models::ErrorResponse;
use village_match::routes::{self, matches::AppState};
use village_match::services::{
    AppwriteClient, AppwriteCollections, CacheManager, CachedProfileStore, EngineStores,
    MatchEngine, MatchEventBus, MemoryStore, PostgresClient,
};

/// Rejected request payload, rendered with the common error body
#[derive(Debug)]
pub struct PayloadError(ErrorResponse);

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.0.error, self.0.message)
    }
}

impl std::error::Error for PayloadError {}

impl error::ResponseError for PayloadError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(&self.0)
    }
}

fn payload_error(error: &str, message: String) -> actix_web::Error {
    PayloadError(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: 400,
        retryable: false,
    })
    .into()
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    payload_error("invalid_json", format!("Invalid JSON: {}", err))
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    payload_error("invalid_query", format!("Invalid query: {}", err))
}

/// `RUST_LOG` wins over `logging.level`
fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match logging.format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

/// Wire the engine against PostgreSQL and Appwrite
async fn postgres_backend(
    settings: &Settings,
) -> std::io::Result<(EngineStores, Arc<PostgresClient>)> {
    let postgres = Arc::new(
        PostgresClient::from_settings(
            &settings.database.url,
            settings.database.max_connections,
            settings.database.min_connections,
            settings.database.acquire_timeout_secs,
            settings.database.idle_timeout_secs,
        )
        .await
        .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?,
    );

    info!("PostgreSQL client initialized");

    let collections = AppwriteCollections {
        profiles: settings.collection.profiles.clone(),
        filter_preferences: settings.collection.filter_preferences.clone(),
        blocks: settings.collection.blocks.clone(),
        notifications: settings.collection.notifications.clone(),
        chat_threads: settings.collection.chat_threads.clone(),
        messages: settings.collection.messages.clone(),
    };

    let appwrite = Arc::new(
        AppwriteClient::new(
            settings.appwrite.endpoint.clone(),
            settings.appwrite.api_key.clone(),
            settings.appwrite.project_id.clone(),
            settings.appwrite.database_id.clone(),
            collections,
            settings.matching.candidate_fetch_limit,
        )
        .map_err(|e| startup_error("Failed to build Appwrite client", e))?,
    );

    info!("Appwrite client initialized");

    // Redis is optional; without it profile reads are cached per instance
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let cache = match CacheManager::new(settings.cache.redis_url.as_deref(), l1_cache_size, cache_ttl).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to connect to Redis ({}), using in-process cache only", e);
            CacheManager::l1_only(l1_cache_size, cache_ttl)
        }
    };

    info!(
        "Cache manager initialized (L1: {} entries, TTL: {}s, L2: {})",
        l1_cache_size,
        cache_ttl,
        cache.has_l2()
    );

    let profiles = Arc::new(CachedProfileStore::new(appwrite.clone(), Arc::new(cache)));

    let stores = EngineStores {
        profiles,
        decisions: postgres.clone(),
        connections: postgres.clone(),
        notifier: appwrite.clone(),
        chat: appwrite,
    };

    Ok((stores, postgres))
}

/// Periodically retry mutual checks that failed after their decision was stored
fn spawn_recheck_loop(engine: Arc<MatchEngine>, interval_secs: u64) {
    if interval_secs == 0 {
        info!("Pending re-check loop disabled");
        return;
    }

    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            if engine.pending_rechecks() > 0 {
                engine.retry_pending_rechecks().await;
            }
        }
    });
}

/// Trace realtime events; lagging only loses log lines
fn spawn_event_logger(engine: &MatchEngine) {
    let mut events = engine.subscribe();
    actix_web::rt::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!("Match event: {:?}", event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("Event logger skipped {} events", n)
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_tracing(&settings.logging);

    info!("Starting Village matching service...");

    let (stores, postgres) = match settings.store.backend {
        StoreBackend::Postgres => {
            let (stores, postgres) = postgres_backend(&settings).await?;
            (stores, Some(postgres))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory stores; state is lost on restart");
            (EngineStores::from_memory(Arc::new(MemoryStore::new())), None)
        }
    };

    let weights = settings.scoring_weights();
    let matcher = Matcher::new(weights);

    info!("Matcher initialized with weights: {:?}", weights);

    let engine = Arc::new(MatchEngine::with_event_bus(
        stores,
        matcher,
        MatchEventBus::new(settings.matching.event_capacity),
    ));

    spawn_recheck_loop(engine.clone(), settings.matching.recheck_interval_secs);
    spawn_event_logger(&engine);

    let app_state = AppState {
        engine,
        postgres,
        default_strategy: settings.matching.default_strategy,
        default_limit: settings.matching.default_limit,
        max_limit: settings.matching.max_limit,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
