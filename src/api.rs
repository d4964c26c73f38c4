// 🌐 REST API - axum router over the shared SQLite connection
//
// Every protected handler follows the same order: bearer token → identity →
// permission check → work. Failures render as JSON through `RequestError`.

use crate::auth::{self, LoginRequest, RegisterRequest};
use crate::config::Config;
use crate::customers::{self, CreateCustomer};
use crate::db::{CustomerView, InteractionSummary};
use crate::error::{RequestError, RequestResult};
use crate::normalizer::CatalogNormalizer;
use crate::pagination::{paginate, PageRequest, Paginated};
use crate::permissions::{EndpointKey, Operation, PermissionSet};
use crate::repository::SqliteStore;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: Arc<Config>,
    pub normalizer: Arc<CatalogNormalizer>,
}

impl AppState {
    pub fn new(conn: Connection, config: Config) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            normalizer: Arc::new(CatalogNormalizer::new()),
        }
    }

    fn lock(&self) -> RequestResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| RequestError::Internal("database lock poisoned".to_string()))
    }
}

/// Health payload
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

// ============================================================================
// Helpers
// ============================================================================

/// Resolve the caller and require `op` on `endpoint`
fn authorized_caller(
    conn: &Connection,
    headers: &HeaderMap,
    endpoint: EndpointKey,
    op: Operation,
) -> RequestResult<String> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = auth::bearer_token(header)?;

    let store = SqliteStore::new(conn);
    let identity = auth::identity_for_token(&store, token, Utc::now())?;
    auth::authorize(&store, &identity, endpoint, op)?;

    Ok(identity)
}

/// Split `page` / `page_size` off the query, returning the remaining pairs
fn page_and_filters(
    params: Vec<(String, String)>,
    default_page_size: usize,
) -> RequestResult<(PageRequest, Vec<(String, String)>)> {
    let mut page = None;
    let mut page_size = None;
    let mut rest = Vec::new();

    for (key, value) in params {
        match key.as_str() {
            "page" => page = Some(value),
            "page_size" => page_size = Some(value),
            _ => rest.push((key, value)),
        }
    }

    let request = PageRequest::from_query(page.as_deref(), page_size.as_deref(), default_page_size)?;
    Ok((request, rest))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> RequestResult<T> {
    body.map(|Json(value)| value)
        .map_err(|e| RequestError::validation(e.body_text()))
}

fn required_field(name: &str, value: Option<String>) -> RequestResult<String> {
    value.ok_or_else(|| RequestError::validation(format!("{name} is required")))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/health
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse {
        success: true,
        data: "OK",
    })
}

/// POST /api/v1/login
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> RequestResult<Json<auth::IssuedToken>> {
    let req = json_body(body)?;
    let username = required_field("username", req.username)?;
    let password = required_field("password", req.password)?;

    let ttl = state
        .config
        .token_ttl()
        .ok_or_else(|| RequestError::Internal("TOKEN_TTL_SECS out of range".to_string()))?;

    let conn = state.lock()?;
    let issued = auth::login(&SqliteStore::new(&conn), &username, &password, ttl)?;

    Ok(Json(issued))
}

/// POST /api/v1/register - admin only
async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> RequestResult<Json<MessageResponse>> {
    let conn = state.lock()?;
    authorized_caller(&conn, &headers, EndpointKey::Admin, Operation::Admin)?;

    let req = json_body(body)?;
    let username = required_field("username", req.username)?;
    let password = required_field("password", req.password)?;
    let permissions: PermissionSet = match req.permissions {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| RequestError::validation(format!("Invalid permissions: {e}")))?,
        None => PermissionSet::default(),
    };

    auth::register_user(&SqliteStore::new(&conn), &username, &password, &permissions)?;

    Ok(Json(MessageResponse {
        message: "User registered successfully".to_string(),
    }))
}

/// GET /api/v1/customers?<field>=<value>&page&page_size
async fn get_customers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> RequestResult<Json<Paginated<CustomerView>>> {
    let conn = state.lock()?;
    authorized_caller(&conn, &headers, EndpointKey::GetCustomers, Operation::Read)?;

    let (page, filters) = page_and_filters(params, state.config.default_page_size)?;
    let filters = customers::parse_customer_filters(
        filters.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    )?;

    let records = customers::list_customers(&SqliteStore::new(&conn), &filters)?;
    Ok(Json(paginate(records, page)))
}

/// POST /api/v1/customers
async fn create_customers(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateCustomer>, JsonRejection>,
) -> RequestResult<Json<Paginated<CustomerView>>> {
    let mut conn = state.lock()?;
    authorized_caller(&conn, &headers, EndpointKey::CreateCustomers, Operation::Write)?;

    let req = json_body(body)?;
    let created = customers::create_customer_atomic(&mut conn, &state.normalizer, &req)?;

    Ok(Json(paginate(vec![created], PageRequest::default())))
}

/// GET /api/v1/interactions
async fn get_all_interactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> RequestResult<Json<Paginated<InteractionSummary>>> {
    interactions_page(&state, &headers, None, params)
}

/// GET /api/v1/interactions/:customer_id
async fn get_interactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(customer_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> RequestResult<Json<Paginated<InteractionSummary>>> {
    let customer_id = customer_id
        .parse::<i64>()
        .map_err(|_| RequestError::validation("customer_id must be an integer"))?;

    interactions_page(&state, &headers, Some(customer_id), params)
}

fn interactions_page(
    state: &AppState,
    headers: &HeaderMap,
    customer_id: Option<i64>,
    params: Vec<(String, String)>,
) -> RequestResult<Json<Paginated<InteractionSummary>>> {
    let conn = state.lock()?;
    authorized_caller(&conn, headers, EndpointKey::GetInteractions, Operation::Read)?;

    let (page, extra) = page_and_filters(params, state.config.default_page_size)?;
    if let Some((key, _)) = extra.first() {
        return Err(RequestError::validation(format!("Unknown parameter: {key}")));
    }

    let summaries = customers::interactions_for_customer(&SqliteStore::new(&conn), customer_id)?;
    Ok(Json(paginate(summaries, page)))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/customers", get(get_customers).post(create_customers))
        .route("/interactions", get(get_all_interactions))
        .route("/interactions/:customer_id", get(get_interactions))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_and_filters_split() {
        let params = vec![
            ("page".to_string(), "2".to_string()),
            ("type_name".to_string(), "Retail".to_string()),
            ("page_size".to_string(), "5".to_string()),
        ];

        let (page, rest) = page_and_filters(params, 1000).unwrap();
        assert_eq!(page, PageRequest { page: 2, page_size: 5 });
        assert_eq!(rest, vec![("type_name".to_string(), "Retail".to_string())]);
    }

    #[test]
    fn test_page_and_filters_uses_configured_default() {
        let (page, rest) = page_and_filters(Vec::new(), 50).unwrap();
        assert_eq!(page, PageRequest { page: 1, page_size: 50 });
        assert!(rest.is_empty());
    }
}
