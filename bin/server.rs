// Facility Map - Web Server
// REST API with Axum over the shared dataset cache

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use facility_map::{
    category_counts, coordinate_coverage, distinct_values, load_catalog, logging,
    map_unavailable_notice, render_map, AppConfig, CoordinateCoverage, DatasetCache, Entity, Error,
    Field, FilterSpec, FilterValue, LoadReport, MarkerTemplate,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
struct AppState {
    cache: Arc<DatasetCache>,
    config: Arc<AppConfig>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Domain listing entry
#[derive(Serialize)]
struct DomainResponse {
    name: String,
    title: String,
    file: String,
    filter_fields: Vec<String>,
}

/// Stats response
#[derive(Serialize)]
struct StatsResponse {
    domain: String,
    fingerprint: String,
    loaded_at: String,
    report: LoadReport,
    coverage: CoordinateCoverage,
    by_category: Vec<CategoryStat>,
}

#[derive(Serialize)]
struct CategoryStat {
    category: String,
    count: usize,
}

/// Query string shared by the filtered endpoints. Absent means "all".
#[derive(Debug, Default, Deserialize)]
struct FilterQuery {
    category: Option<String>,
    subcategory: Option<String>,
    region: Option<String>,
    name: Option<String>,
}

impl FilterQuery {
    fn to_spec(&self) -> FilterSpec {
        FilterSpec::match_all()
            .with(Field::Category, FilterValue::from_option(self.category.clone()))
            .with(Field::Subcategory, FilterValue::from_option(self.subcategory.clone()))
            .with(Field::Region, FilterValue::from_option(self.region.clone()))
            .with(Field::Name, FilterValue::from_option(self.name.clone()))
    }
}

/// Map a library error onto a status code and JSON body
fn error_response(e: Error) -> Response {
    let status = match &e {
        Error::UnknownDomain(_) => StatusCode::NOT_FOUND,
        Error::TemplateNotFound { .. } => StatusCode::NOT_FOUND,
        Error::ConfigurationMissing { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("request failed: {}", e);
    } else {
        warn!("request failed: {}", e);
    }

    (status, Json(ApiResponse::<()>::err(e.to_string()))).into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/domains - Configured domains
async fn get_domains(State(state): State<AppState>) -> impl IntoResponse {
    let response: Vec<DomainResponse> = state
        .cache
        .catalog()
        .iter()
        .map(|d| DomainResponse {
            name: d.name.clone(),
            title: d.title.clone(),
            file: d.file.clone(),
            filter_fields: d.filter_fields.iter().map(|f| f.to_string()).collect(),
        })
        .collect();

    Json(ApiResponse::ok(response))
}

/// GET /api/domains/:domain/entities - Filtered entities
async fn get_entities(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(query): Query<FilterQuery>,
) -> Response {
    match state.cache.get(&domain) {
        Ok(dataset) => {
            let response: Vec<Entity> = dataset
                .view(&query.to_spec())
                .into_iter()
                .cloned()
                .collect();

            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /api/domains/:domain/options/:field - Dropdown options for a field
async fn get_options(
    State(state): State<AppState>,
    Path((domain, field)): Path<(String, String)>,
) -> Response {
    match state.cache.get(&domain) {
        Ok(dataset) => {
            let options = distinct_values(dataset.entities(), &Field::parse(&field));
            (StatusCode::OK, Json(ApiResponse::ok(options))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /api/domains/:domain/stats - Load report, coverage and category counts
async fn get_stats(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(query): Query<FilterQuery>,
) -> Response {
    let dataset = match state.cache.get(&domain) {
        Ok(dataset) => dataset,
        Err(e) => return error_response(e),
    };

    let view = dataset.view(&query.to_spec());
    let by_category = category_counts(&view)
        .into_iter()
        .map(|(category, count)| CategoryStat { category, count })
        .collect();

    let response = StatsResponse {
        domain: dataset.domain.clone(),
        fingerprint: dataset.fingerprint.clone(),
        loaded_at: dataset.loaded_at.to_rfc3339(),
        report: dataset.report.clone(),
        coverage: coordinate_coverage(&view),
        by_category,
    };

    (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
}

/// GET /api/domains/:domain/map - Rendered map document
async fn get_map(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(query): Query<FilterQuery>,
) -> Response {
    let Some(credentials) = state.config.credentials.as_ref() else {
        warn!(domain = %domain, "map requested without credentials");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Html(format!("<p>{}</p>", map_unavailable_notice())),
        )
            .into_response();
    };

    let dataset = match state.cache.get(&domain) {
        Ok(dataset) => dataset,
        Err(e) => return error_response(e),
    };

    let template = match MarkerTemplate::from_file(&state.config.template_path) {
        Ok(template) => template,
        Err(e) => return error_response(e),
    };

    let view = dataset.view(&query.to_spec());
    (StatusCode::OK, Html(render_map(&template, view, credentials))).into_response()
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    println!("🌐 Facility Map - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = AppConfig::from_env();
    let catalog = load_catalog(&config)?;
    println!("✓ {} domains from {}", catalog.len(), config.data_dir.display());

    if !config.map_available() {
        println!("⚠ {} not set, /map endpoints will return 503", facility_map::config::ENV_API_KEY);
    }

    let addr = config.server_addr.clone();

    // Create shared state
    let state = AppState {
        cache: Arc::new(DatasetCache::new(catalog, config.data_dir.clone())),
        config: Arc::new(config),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/domains", get(get_domains))
        .route("/domains/:domain/entities", get(get_entities))
        .route("/domains/:domain/options/:field", get(get_options))
        .route("/domains/:domain/stats", get(get_stats))
        .route("/domains/:domain/map", get(get_map))
        .with_state(state);

    // Build main router
    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "server listening");
    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/domains", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;

    Ok(())
}
