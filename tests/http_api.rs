#![cfg(feature = "server")]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use customer_api::api::{router, AppState};
use customer_api::{
    open_database, register_user, CatalogKind, CatalogRepository, Config, EndpointKey,
    NewInteraction, InteractionRepository, OperationFlags, PermissionSet, SqliteStore,
    INSUFFICIENT_PERMISSIONS,
};

/// App with an admin user plus a second user holding `permissions`
fn app_with_user(permissions: PermissionSet) -> (Router, AppState) {
    let conn = open_database(":memory:").unwrap();
    {
        let store = SqliteStore::new(&conn);
        register_user(&store, "admin", "admin-pw", &PermissionSet::superuser()).unwrap();
        register_user(&store, "testuser", "test-pw", &permissions).unwrap();
    }

    let state = AppState::new(conn, Config::testing());
    (router(state.clone()), state)
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

async fn token_for(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["access_token"].as_str().unwrap().to_string()
}

fn read_write(key: EndpointKey) -> PermissionSet {
    PermissionSet::default().with(key, OperationFlags::parse("RW").unwrap())
}

#[tokio::test]
async fn health_needs_no_token() {
    let (app, _) = app_with_user(PermissionSet::default());
    let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "OK");
}

#[tokio::test]
async fn login_rejects_bad_password() {
    let (app, _) = app_with_user(PermissionSet::default());
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/login",
        None,
        Some(json!({ "username": "admin", "password": "nope" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn login_requires_both_fields() {
    let (app, _) = app_with_user(PermissionSet::default());
    let (status, _) = send(&app, "POST", "/api/v1/login", None, Some(json!({ "username": "admin" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_or_bogus_token_is_unauthorized() {
    let (app, _) = app_with_user(PermissionSet::default());

    let (status, _) = send(&app, "GET", "/api/v1/customers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, "GET", "/api/v1/customers", Some("deadbeef"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn create_customer_new_occupation_type() {
    let (app, _) = app_with_user(read_write(EndpointKey::CreateCustomers));
    let token = token_for(&app, "testuser", "test-pw").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/customers",
        Some(token.as_str()),
        Some(json!({
            "customer_name": "New Customer",
            "occupation_name": "New Occupation",
            "type_name": "New Type"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["response_code"], 200);
    assert_eq!(body["result_count"], 1);
    assert_eq!(body["data"][0]["customer_name"], "New Customer");
    assert_eq!(body["data"][0]["occupation_name"], "New Occupation");
    assert_eq!(body["data"][0]["type_name"], "New Type");
}

#[tokio::test]
async fn create_customer_existing_occupation_type() {
    let (app, state) = app_with_user(read_write(EndpointKey::CreateCustomers));
    {
        let conn = state.db.lock().unwrap();
        let store = SqliteStore::new(&conn);
        store.insert_catalog_entry(CatalogKind::Type, "Existing Type").unwrap();
        store.insert_catalog_entry(CatalogKind::Occupation, "Existing Occupation").unwrap();
    }
    let token = token_for(&app, "testuser", "test-pw").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/customers",
        Some(token.as_str()),
        Some(json!({
            "customer_name": "Customer With Existing Data",
            "occupation_name": "Existing Occupation",
            "type_name": "Existing Type"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"][0]["customer_name"], "Customer With Existing Data");

    let conn = state.db.lock().unwrap();
    let store = SqliteStore::new(&conn);
    assert_eq!(store.catalog_names(CatalogKind::Type).unwrap(), vec!["Existing Type"]);
}

#[tokio::test]
async fn create_customer_similar_occupation_type() {
    let (app, state) = app_with_user(read_write(EndpointKey::CreateCustomers));
    {
        let conn = state.db.lock().unwrap();
        let store = SqliteStore::new(&conn);
        store.insert_catalog_entry(CatalogKind::Type, "Developer").unwrap();
        store.insert_catalog_entry(CatalogKind::Occupation, "Engineer").unwrap();
    }
    let token = token_for(&app, "testuser", "test-pw").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/customers",
        Some(token.as_str()),
        Some(json!({
            "customer_name": "Customer With Typo",
            "occupation_name": "Engneer",
            "type_name": "Devloper"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"][0]["occupation_name"], "Engineer");
    assert_eq!(body["data"][0]["type_name"], "Developer");
}

#[tokio::test]
async fn create_customer_insufficient_permissions() {
    let read_only = PermissionSet::default()
        .with(EndpointKey::CreateCustomers, OperationFlags::parse("R").unwrap());
    let (app, _) = app_with_user(read_only);
    let token = token_for(&app, "testuser", "test-pw").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/customers",
        Some(token.as_str()),
        Some(json!({
            "customer_name": "Customer With Insufficient Permissions",
            "occupation_name": "Unauthorized Occupation",
            "type_name": "Unauthorized Type"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], INSUFFICIENT_PERMISSIONS);
}

#[tokio::test]
async fn create_customer_missing_field_is_bad_request() {
    let (app, _) = app_with_user(read_write(EndpointKey::CreateCustomers));
    let token = token_for(&app, "testuser", "test-pw").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/customers",
        Some(token.as_str()),
        Some(json!({ "customer_name": "Nameless Type", "occupation_name": "Chef" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "type_name is required");
}

#[tokio::test]
async fn list_customers_filters_and_paginates() {
    let (app, _) = app_with_user(
        read_write(EndpointKey::CreateCustomers).with(EndpointKey::GetCustomers, OperationFlags::parse("R").unwrap()),
    );
    let token = token_for(&app, "testuser", "test-pw").await;

    for i in 0..25 {
        let type_name = if i % 5 == 0 { "Wholesale" } else { "Retail" };
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/customers",
            Some(token.as_str()),
            Some(json!({
                "customer_name": format!("Customer {i:02}"),
                "occupation_name": "Clerk",
                "type_name": type_name
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, "GET", "/api/v1/customers?page=2&page_size=10", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 25);
    assert_eq!(body["result_count"], 10);
    assert_eq!(body["page"], 2);
    assert_eq!(body["data"][0]["customer_name"], "Customer 10");

    let (_, body) = send(&app, "GET", "/api/v1/customers?page=3&page_size=10", Some(token.as_str()), None).await;
    assert_eq!(body["result_count"], 5);

    let (_, body) = send(&app, "GET", "/api/v1/customers?page=9&page_size=10", Some(token.as_str()), None).await;
    assert_eq!(body["result_count"], 0);

    let (_, body) = send(&app, "GET", "/api/v1/customers?type_name=Wholesale", Some(token.as_str()), None).await;
    assert_eq!(body["total_count"], 5);

    let (status, _) = send(&app, "GET", "/api/v1/customers?password_hash=x", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn read_all_override_grants_reads_only() {
    let (app, _) = app_with_user(PermissionSet {
        read_all: true,
        ..PermissionSet::default()
    });
    let token = token_for(&app, "testuser", "test-pw").await;

    let (status, _) = send(&app, "GET", "/api/v1/customers", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/customers",
        Some(token.as_str()),
        Some(json!({ "customer_name": "A", "occupation_name": "B", "type_name": "C" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn interactions_by_customer() {
    let (app, state) = app_with_user(PermissionSet::superuser());
    let token = token_for(&app, "testuser", "test-pw").await;

    let (_, created) = send(
        &app,
        "POST",
        "/api/v1/customers",
        Some(token.as_str()),
        Some(json!({ "customer_name": "Alice", "occupation_name": "Nurse", "type_name": "Retail" })),
    )
    .await;
    let alice_id = created["data"][0]["id_customer"].as_i64().unwrap();

    {
        let conn = state.db.lock().unwrap();
        let store = SqliteStore::new(&conn);
        for channel in ["email", "email", "phone"] {
            store
                .insert_interaction(&NewInteraction {
                    customer_id: alice_id,
                    channel: channel.to_string(),
                    occurred_at: None,
                })
                .unwrap();
        }
    }

    let uri = format!("/api/v1/interactions/{alice_id}");
    let (status, body) = send(&app, "GET", &uri, Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result_count"], 1);
    assert_eq!(body["data"][0]["channel_counts"]["email"], 2);
    assert_eq!(body["data"][0]["channel_counts"]["phone"], 1);

    let (status, body) = send(&app, "GET", "/api/v1/interactions", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 1);

    let (status, _) = send(&app, "GET", "/api/v1/interactions/9999", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/api/v1/interactions/abc", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_requires_admin_and_rejects_duplicates() {
    let (app, _) = app_with_user(read_write(EndpointKey::GetCustomers));

    let user_token = token_for(&app, "testuser", "test-pw").await;
    let payload = json!({
        "username": "analyst",
        "password": "analyst-pw",
        "permissions": { "get_customers": "R", "get_interactions": "R" }
    });

    let (status, _) = send(&app, "POST", "/api/v1/register", Some(user_token.as_str()), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_token = token_for(&app, "admin", "admin-pw").await;
    let (status, body) = send(&app, "POST", "/api/v1/register", Some(admin_token.as_str()), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "User registered successfully");

    let (status, body) = send(&app, "POST", "/api/v1/register", Some(admin_token.as_str()), Some(payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Username already exists");

    // The new account can log in and read
    let analyst = token_for(&app, "analyst", "analyst-pw").await;
    let (status, _) = send(&app, "GET", "/api/v1/customers", Some(analyst.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn register_rejects_unknown_permission_keys() {
    let (app, _) = app_with_user(PermissionSet::default());
    let admin_token = token_for(&app, "admin", "admin-pw").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/register",
        Some(admin_token.as_str()),
        Some(json!({ "username": "x", "password": "y", "permissions": { "drop_tables": "W" } })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn interactions_reject_unknown_query_parameters() {
    let (app, _) = app_with_user(PermissionSet::superuser());
    let token = token_for(&app, "testuser", "test-pw").await;

    let (status, body) = send(&app, "GET", "/api/v1/interactions?channel=email", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unknown parameter: channel");

    let (status, _) = send(&app, "GET", "/api/v1/interactions?page=1&page_size=5", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
}
