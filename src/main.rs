pub mod api;
mod config;
mod engine;
mod generation;
mod models;
mod providers;
mod store;

use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::SqlitePool;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use engine::OffsetResolver;
use generation::GenerationManager;
use store::TimetableStore;

#[derive(OpenApi)]
#[openapi(
    info(title = "City Bus ETA API", version = "0.1.0"),
    paths(
        api::routes::list_routes,
        api::routes::get_route,
        api::routes::get_route_stops,
        api::routes::get_route_offsets,
        api::routes::get_route_etas,
        api::routes::get_route_trips,
        api::routes::generate_route_trips,
        api::stops::get_stop,
        api::stops::get_stop_arrivals,
        api::trips::get_trip,
        api::health::health_check,
    ),
    components(schemas(
        api::ErrorResponse,
        api::health::HealthResponse,
        api::routes::RouteListResponse,
        api::routes::RouteSummary,
        api::routes::RouteDetailResponse,
        api::routes::RouteEndpoints,
        api::routes::EndpointStop,
        api::routes::DirectionBreakdown,
        api::routes::DirectionStats,
        api::routes::GeoTotals,
        api::routes::DataStatus,
        api::routes::StopListResponse,
        api::routes::StopOffsetsResponse,
        api::routes::StopOffsetRow,
        api::routes::UpcomingTripsResponse,
        api::routes::GenerateTripsRequest,
        api::routes::GenerateTripsResponse,
        api::stops::StopDetailResponse,
        engine::eta::RouteEtas,
        engine::eta::StopEta,
        engine::eta::ArrivalBoard,
        engine::eta::StopArrival,
        engine::eta::TripSchedule,
        engine::eta::TripStopTime,
        engine::trips::UpcomingTrip,
        engine::OffsetSource,
        models::Direction,
        models::Route,
        models::Stop,
        models::Trip,
    )),
    tags(
        (name = "routes", description = "Routes, schedules and ETA projections"),
        (name = "stops", description = "Stops and arrival boards"),
        (name = "trips", description = "Generated trip records"),
        (name = "health", description = "Service health check")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info,sqlx=warn".into()),
        )
        .init();

    // Load config
    let config = Config::load("config.yaml").expect("Failed to load config");
    tracing::info!(timezone = %config.timezone, "Loaded configuration");

    // Build CORS layer based on config
    let cors_layer = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode explicitly enabled (all origins allowed) - DO NOT USE IN PRODUCTION");
        CorsLayer::permissive()
    } else if !config.cors_origins.is_empty() {
        tracing::info!(origins = ?config.cors_origins, "CORS: Restricting to configured origins");
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        panic!("CORS configuration error: Either set 'cors_origins' with allowed origins, or set 'cors_permissive: true' for development");
    };

    // Initialize SQLite database
    let cwd = std::env::current_dir().expect("Failed to get current directory");
    let db_path = cwd.join("database");
    if let Err(e) = std::fs::create_dir_all(&db_path) {
        tracing::warn!("Could not create database directory: {}", e);
    }
    let db_file = db_path.join("data.db");
    tracing::info!("Database path: {}, exists: {}", db_file.display(), db_file.exists());
    let db_url = format!("sqlite:{}?mode=rwc", db_file.display());
    let pool = SqlitePool::connect(&db_url)
        .await
        .expect("Failed to connect to SQLite database");

    // Run migrations
    let migrator = sqlx::migrate!("./migrations");
    tracing::info!(migrations = migrator.migrations.len(), "Found migrations");
    migrator
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    tracing::info!("Database migrations completed");

    let store = TimetableStore::new(pool.clone());
    let resolver =
        Arc::new(OffsetResolver::new(&config).expect("Failed to initialize offset resolver"));

    // Start the background trip generation sweep
    if config.generation.enabled {
        let manager = Arc::new(GenerationManager::new(store.clone(), &config));
        tokio::spawn(async move {
            manager.start().await;
        });
    } else {
        tracing::info!("Background trip generation disabled by config");
    }

    let state = api::ApiState {
        store,
        resolver,
        timezone: config.parsed_timezone(),
        horizon_minutes: config.engine.default_horizon_minutes,
        default_fare_amount: config.engine.default_fare_amount,
    };

    // Build the app
    let app = Router::new()
        .route("/", get(root))
        .nest("/api", api::router(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("Failed to bind to port 3000");

    tracing::info!("Server running on http://localhost:3000");
    tracing::info!("Swagger UI: http://localhost:3000/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

async fn root() -> &'static str {
    "City Bus ETA API"
}
