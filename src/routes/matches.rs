use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::core::SessionSwipeCache;
use crate::models::{
    CandidateQueueRequest, CandidateQueueResponse, ConnectionsResponse, DecideRequest,
    DecideResponse, ErrorResponse, HealthResponse, Strategy, UnmatchRequest, UnmatchResponse,
};
use crate::services::{parse_choice, parse_strategy, EngineError, MatchEngine, PostgresClient};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchEngine>,
    /// Probed by the health endpoint when the postgres backend is active
    pub postgres: Option<Arc<PostgresClient>>,
    pub default_strategy: Strategy,
    pub default_limit: u16,
    pub max_limit: u16,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches/queue", web::post().to(candidate_queue))
        .route("/matches/decide", web::post().to(decide))
        .route("/matches/unmatch", web::post().to(unmatch))
        .route("/matches/connections", web::get().to(connections));
}

fn validation_error(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message,
        status_code: 400,
        retryable: false,
    })
}

/// Translate an engine error into the JSON error body
fn engine_error(err: EngineError) -> HttpResponse {
    let message = err.to_string();
    match err {
        EngineError::Validation(_) => validation_error(message),
        EngineError::NotFound(_) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Not found".to_string(),
            message,
            status_code: 404,
            retryable: false,
        }),
        EngineError::Superseded(_) => HttpResponse::Conflict().json(ErrorResponse {
            error: "Superseded".to_string(),
            message,
            status_code: 409,
            retryable: false,
        }),
        EngineError::TransientStore(e) => {
            tracing::error!("Transient store failure: {}", e);
            HttpResponse::ServiceUnavailable().json(ErrorResponse {
                error: "Store unavailable".to_string(),
                message,
                status_code: 503,
                retryable: true,
            })
        }
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = match &state.postgres {
        Some(postgres) => postgres.health_check().await.unwrap_or(false),
        None => true,
    };

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Ranked candidate queue
///
/// POST /api/v1/matches/queue
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "strategy": "recommended|nearby|lifestyle|same_stage",
///   "limit": 20,
///   "hiddenIds": ["string"]
/// }
/// ```
async fn candidate_queue(
    state: web::Data<AppState>,
    req: web::Json<CandidateQueueRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for queue request: {:?}", errors);
        return validation_error(errors.to_string());
    }

    let strategy = match req.strategy.as_deref() {
        Some(name) => match parse_strategy(name) {
            Ok(strategy) => strategy,
            Err(e) => return engine_error(e),
        },
        None => state.default_strategy,
    };

    let limit = match req.limit {
        0 => state.default_limit,
        n => n.min(state.max_limit),
    } as usize;

    let mut session = SessionSwipeCache::from_ids(req.hidden_ids.iter().cloned());

    match state
        .engine
        .get_candidate_queue(&req.user_id, strategy, &mut session)
        .await
    {
        Ok(queue) => {
            let response = CandidateQueueResponse {
                candidates: queue.top(limit),
                strategy: queue.strategy(),
                total_results: queue.len(),
            };

            tracing::info!(
                "Returning {} candidates for {} ({})",
                response.candidates.len(),
                req.user_id,
                strategy
            );

            HttpResponse::Ok().json(response)
        }
        Err(e) => engine_error(e),
    }
}

/// Record a like or pass
///
/// POST /api/v1/matches/decide
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "candidateId": "string",
///   "choice": "like|pass",
///   "openingMessage": "string"
/// }
/// ```
async fn decide(
    state: web::Data<AppState>,
    req: web::Json<DecideRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors.to_string());
    }

    let choice = match parse_choice(&req.choice) {
        Ok(choice) => choice,
        Err(e) => return engine_error(e),
    };

    match state
        .engine
        .decide(&req.user_id, &req.candidate_id, choice, req.opening_message.as_deref())
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(DecideResponse {
            mutual: outcome.mutual,
            is_first_match: outcome.is_first_match,
            connection_id: outcome.connection_id.map(|id| id.to_string()),
            was_new_decision: outcome.was_new_decision,
            stale: outcome.stale,
        }),
        Err(e) => engine_error(e),
    }
}

/// Dissolve a connection
///
/// POST /api/v1/matches/unmatch
async fn unmatch(
    state: web::Data<AppState>,
    req: web::Json<UnmatchRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_error(errors.to_string());
    }

    match state.engine.unmatch(&req.user_id, &req.other_user_id).await {
        Ok(removed) => HttpResponse::Ok().json(UnmatchResponse { removed }),
        Err(e) => engine_error(e),
    }
}

/// Connected user ids
///
/// GET /api/v1/matches/connections?userId={userId}
async fn connections(
    state: web::Data<AppState>,
    query: web::Query<std::collections::HashMap<String, String>>,
) -> impl Responder {
    let user_id = match query.get("userId") {
        Some(id) => id,
        None => return validation_error("userId query parameter is required".to_string()),
    };

    match state.engine.connected_ids(user_id).await {
        Ok(ids) => HttpResponse::Ok().json(ConnectionsResponse {
            user_id: user_id.clone(),
            count: ids.len(),
            connections: ids,
        }),
        Err(e) => engine_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Matcher;
    use crate::models::{Child, Location, Profile};
    use crate::services::{EngineStores, MemoryStore, StoreError};
    use actix_web::{http::StatusCode, test, App};

    fn profile(id: &str) -> Profile {
        Profile {
            user_id: id.to_string(),
            name: id.to_string(),
            location: Location {
                region: "North".to_string(),
                city: "Leeds".to_string(),
                area: "Headingley".to_string(),
            },
            children: vec![Child {
                age_months: 10,
                name: None,
                gender: None,
            }],
            interests: vec!["parks".to_string()],
            lifestyle: vec![],
            is_active: true,
            description: None,
            image_file_ids: vec![],
            created_at: None,
        }
    }

    fn state() -> AppState {
        let store = Arc::new(MemoryStore::new());
        for id in ["alice", "bea", "cara"] {
            store.put_profile(profile(id));
        }
        AppState {
            engine: Arc::new(MatchEngine::new(
                EngineStores::from_memory(store),
                Matcher::with_default_weights(),
            )),
            postgres: None,
            default_strategy: Strategy::Recommended,
            default_limit: 20,
            max_limit: 100,
        }
    }

    #[::core::prelude::v1::test]
    fn test_engine_error_status_codes() {
        let transient = engine_error(EngineError::TransientStore(StoreError::Unavailable(
            "db".to_string(),
        )));
        assert_eq!(transient.status(), StatusCode::SERVICE_UNAVAILABLE);

        let superseded = engine_error(EngineError::Superseded("alice".to_string()));
        assert_eq!(superseded.status(), StatusCode::CONFLICT);

        let invalid = engine_error(EngineError::Validation("bad".to_string()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_mutual_like_over_http() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .service(web::scope("/api/v1").configure(configure)),
        )
        .await;

        let first = test::TestRequest::post()
            .uri("/api/v1/matches/decide")
            .set_json(serde_json::json!({"userId": "alice", "candidateId": "bea", "choice": "like"}))
            .to_request();
        let first: DecideResponse = test::call_and_read_body_json(&app, first).await;
        assert!(!first.mutual);

        let second = test::TestRequest::post()
            .uri("/api/v1/matches/decide")
            .set_json(serde_json::json!({"userId": "bea", "candidateId": "alice", "choice": "liked"}))
            .to_request();
        let second: DecideResponse = test::call_and_read_body_json(&app, second).await;
        assert!(second.mutual);
        assert!(second.is_first_match);
        assert!(second.connection_id.is_some());

        let req = test::TestRequest::get()
            .uri("/api/v1/matches/connections?userId=alice")
            .to_request();
        let body: ConnectionsResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.connections, vec!["bea".to_string()]);
    }

    #[actix_web::test]
    async fn test_queue_rejects_unknown_strategy() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .service(web::scope("/api/v1").configure(configure)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/matches/queue")
            .set_json(serde_json::json!({"userId": "alice", "strategy": "random"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/matches/queue")
            .set_json(serde_json::json!({"userId": "alice", "strategy": "nearby"}))
            .to_request();
        let body: CandidateQueueResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.strategy, Strategy::Nearby);
        assert_eq!(body.candidates.len(), 2);
    }

    #[actix_web::test]
    async fn test_self_decision_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .service(web::scope("/api/v1").configure(configure)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/matches/decide")
            .set_json(serde_json::json!({"userId": "alice", "candidateId": "alice", "choice": "like"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
