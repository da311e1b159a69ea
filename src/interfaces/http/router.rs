//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::application::{BlogService, TariffCache, TariffService};
use crate::domain::UserRepository;
use crate::infrastructure::crypto::jwt::JwtConfig;
use crate::interfaces::http::common::{ApiResponse, PaginatedResponse, PaginationParams};
use crate::interfaces::http::middleware::{auth_middleware, optional_auth_middleware, AuthState};

use super::modules::{auth, blogs, health, metrics, request_id, tariffs};

/// Everything the router needs from the running service
pub struct RouterDeps {
    pub db: DatabaseConnection,
    pub tariffs: Arc<TariffService>,
    pub blogs: Arc<BlogService>,
    pub cache: Arc<dyn TariffCache>,
    pub users: Arc<dyn UserRepository>,
    pub jwt_config: JwtConfig,
    pub bcrypt_cost: u32,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
    /// `None` leaves `/metrics` unrouted
    pub prometheus: Option<PrometheusHandle>,
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token from /api/v1/auth/login"))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health_check,
        // Auth
        auth::login,
        auth::register,
        auth::get_current_user,
        auth::list_users,
        auth::change_password,
        // Tariffs
        tariffs::create_tariffs,
        tariffs::upload_tariffs,
        tariffs::list_tariffs,
        tariffs::get_tariff,
        tariffs::update_tariff,
        tariffs::delete_tariff,
        tariffs::delete_batch,
        tariffs::calculate_cost,
        // Blogs
        blogs::create_blog,
        blogs::list_blogs,
        blogs::get_blog,
        blogs::change_blog_status,
        blogs::delete_blog,
    ),
    components(
        schemas(
            // Common
            ApiResponse<String>,
            PaginationParams,
            PaginatedResponse<tariffs::TariffResponse>,
            // Health
            health::HealthResponse,
            health::ComponentHealth,
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            auth::RegisterRequest,
            auth::UserInfo,
            auth::ChangePasswordRequest,
            // Tariffs
            tariffs::TariffResponse,
            tariffs::TariffInput,
            tariffs::BatchTariff,
            tariffs::BatchResponse,
            tariffs::UploadForm,
            tariffs::UpdateTariffRequest,
            tariffs::UpdateTariffResponse,
            tariffs::DeleteTariffResponse,
            tariffs::DeleteBatchResponse,
            tariffs::CalculateCostRequest,
            tariffs::CalculateCostResponse,
            // Blogs
            PaginatedResponse<blogs::BlogResponse>,
            blogs::CreateBlogRequest,
            blogs::BlogResponse,
            blogs::TagResponse,
            blogs::StatusChangeResponse,
            blogs::DeleteBlogResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Store and cache reachability"),
        (name = "Authentication", description = "Login (JWT), registration, password change"),
        (name = "Tariffs", description = "Insurance tariffs grouped by accession date, and cost calculation"),
        (name = "Blogs", description = "Tagged posts by registered users; drafts stay private to their author"),
    ),
    info(
        title = "Tariff Service API",
        version = "1.0.0",
        description = "REST API for insurance tariffs with cached reads and event fan-out to Kafka and RabbitMQ, plus a small blog",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

/// Create the API router with all routes
pub fn create_api_router(deps: RouterDeps) -> Router {
    let middleware_state = AuthState {
        jwt_config: deps.jwt_config.clone(),
    };

    let auth_state = auth::AuthHandlerState {
        users: deps.users,
        jwt_config: deps.jwt_config,
        bcrypt_cost: deps.bcrypt_cost,
    };

    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .with_state(auth_state.clone());

    // Auth routes (protected)
    let auth_protected_routes = Router::new()
        .route("/me", get(auth::get_current_user))
        .route("/users", get(auth::list_users))
        .route("/change-password", put(auth::change_password))
        .layer(middleware::from_fn_with_state(
            middleware_state.clone(),
            auth_middleware,
        ))
        .with_state(auth_state);

    let tariff_state = tariffs::TariffHandlerState {
        service: deps.tariffs,
    };

    // Tariff reads and cost calculation (public)
    let tariff_public_routes = Router::new()
        .route("/", get(tariffs::list_tariffs))
        .route("/calculate", post(tariffs::calculate_cost))
        .route("/{id}", get(tariffs::get_tariff))
        .with_state(tariff_state.clone());

    // Tariff mutations (protected)
    let tariff_protected_routes = Router::new()
        .route("/", post(tariffs::create_tariffs))
        .route("/upload", post(tariffs::upload_tariffs))
        .route(
            "/{id}",
            patch(tariffs::update_tariff).delete(tariffs::delete_tariff),
        )
        .route("/batches/{id}", delete(tariffs::delete_batch))
        .layer(middleware::from_fn_with_state(
            middleware_state.clone(),
            auth_middleware,
        ))
        .with_state(tariff_state);

    let blog_state = blogs::BlogHandlerState {
        service: deps.blogs,
    };

    // Blog reads (public; a token lets authors read their drafts)
    let blog_public_routes = Router::new()
        .route("/", get(blogs::list_blogs))
        .route("/{id}", get(blogs::get_blog))
        .layer(middleware::from_fn_with_state(
            middleware_state.clone(),
            optional_auth_middleware,
        ))
        .with_state(blog_state.clone());

    // Blog writes (protected)
    let blog_protected_routes = Router::new()
        .route("/", post(blogs::create_blog))
        .route("/{id}", delete(blogs::delete_blog))
        .route("/{id}/status", patch(blogs::change_blog_status))
        .layer(middleware::from_fn_with_state(
            middleware_state,
            auth_middleware,
        ))
        .with_state(blog_state);

    let health_state = health::HealthState {
        db: deps.db,
        cache: deps.cache,
        started_at: Arc::new(Instant::now()),
    };
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .with_state(health_state);

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    let mut router = Router::new()
        // Swagger UI
        .merge(swagger_routes)
        // Health
        .merge(health_routes)
        // Auth
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/auth", auth_protected_routes)
        // Tariffs
        .nest("/api/v1/tariffs", tariff_public_routes)
        .nest("/api/v1/tariffs", tariff_protected_routes)
        // Blogs
        .nest("/api/v1/blogs", blog_public_routes)
        .nest("/api/v1/blogs", blog_protected_routes);

    if let Some(handle) = deps.prometheus {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics::prometheus_metrics))
                .with_state(metrics::MetricsState { handle }),
        );
    }

    router
        .layer(middleware::from_fn(metrics::http_metrics_middleware))
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(cors_layer(&deps.cors_origins))
        .layer(TraceLayer::new_for_http())
}
