//! End-to-end tests of the router over in-memory stores.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code uses unwrap/expect

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::{TestRequest, TestServer};
use helpdesk_core::StoreError;
use helpdesk_core::StoreFuture;
use helpdesk_core::api_token::{ApiTokenCreateRequest, ApiTokenService, ApiTokenUserType};
use helpdesk_core::environment::Clock;
use helpdesk_core::ticket::TicketService;
use helpdesk_core::ticket_number::TicketNumberConfig;
use helpdesk_testing::{
    InMemoryApiTokenStore, InMemoryCounterStore, InMemoryDynamicFieldStore,
    InMemoryGenericAgentStore, InMemoryGroupStore, InMemoryPermissionStore,
    InMemoryPostmasterFilterStore, InMemoryTicketStore, test_clock,
};
use helpdesk_web::{AppState, CORRELATION_ID_HEADER, HealthProbe, router};
use serde_json::{Value, json};
use std::sync::Arc;

struct StaticProbe(bool);

impl HealthProbe for StaticProbe {
    fn ping(&self) -> StoreFuture<'_, ()> {
        let healthy = self.0;
        Box::pin(async move {
            if healthy {
                Ok(())
            } else {
                Err(StoreError::Database("connection refused".into()))
            }
        })
    }
}

struct Fixture {
    server: TestServer,
    tickets: InMemoryTicketStore,
    tokens: ApiTokenService,
    admin: String,
    customer: String,
}

impl Fixture {
    async fn new() -> Self {
        Self::with_probe(true).await
    }

    async fn with_probe(healthy: bool) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(test_clock());
        let tickets = InMemoryTicketStore::with_queues([1, 2]);
        let permissions = InMemoryPermissionStore::new();
        let generator = TicketNumberConfig::default()
            .build_generator(clock.clone())
            .unwrap();
        let tokens = ApiTokenService::new(Arc::new(InMemoryApiTokenStore::new()), clock.clone());

        let state = AppState {
            ticket_service: TicketService::new(
                Arc::new(tickets.clone()),
                Arc::new(InMemoryCounterStore::new()),
                generator,
            ),
            tickets: Arc::new(tickets.clone()),
            tokens: tokens.clone(),
            groups: Arc::new(InMemoryGroupStore::seeded(permissions.clone())),
            permissions: Arc::new(permissions),
            postmaster_filters: Arc::new(InMemoryPostmasterFilterStore::new()),
            generic_agent: Arc::new(InMemoryGenericAgentStore::new()),
            dynamic_fields: Arc::new(InMemoryDynamicFieldStore::new()),
            health: Arc::new(StaticProbe(healthy)),
            clock,
        };

        let admin = issue(&tokens, 1, ApiTokenUserType::Agent, &["*"]).await;
        let customer = issue(&tokens, 42, ApiTokenUserType::Customer, &["tickets:read"]).await;

        Self {
            server: TestServer::new(router(state)).unwrap(),
            tickets,
            tokens,
            admin,
            customer,
        }
    }
}

async fn issue(
    tokens: &ApiTokenService,
    user_id: i64,
    user_type: ApiTokenUserType,
    scopes: &[&str],
) -> String {
    tokens
        .generate(
            &ApiTokenCreateRequest {
                name: format!("user {user_id}"),
                scopes: scopes.iter().map(ToString::to_string).collect(),
                expires_in: None,
            },
            user_id,
            user_type,
            user_id,
        )
        .await
        .unwrap()
        .token
}

fn bearer(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

#[tokio::test]
async fn test_health_and_readiness() {
    let fx = Fixture::new().await;
    let response = fx.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "ok");
    assert!(response.headers().contains_key("x-correlation-id"));

    let response = fx.server.get("/ready").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let down = Fixture::with_probe(false).await;
    let response = down.server.get("/ready").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let fx = Fixture::new().await;
    let id = "6f1c7b1e-8d4f-4b5e-9a7a-2f9c1d0e3b4a";
    let response = fx
        .server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-correlation-id"),
            HeaderValue::from_static(id),
        )
        .await;
    assert_eq!(response.header(CORRELATION_ID_HEADER), id);
}

#[tokio::test]
async fn test_authentication_failures() {
    let fx = Fixture::new().await;

    let response = fx.server.get("/api/v1/tokens").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");

    let response = bearer(fx.server.get("/api/v1/tokens"), "hd_short").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = bearer(fx.server.get("/admin/groups"), &fx.customer).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_ticket_create_and_get() {
    let fx = Fixture::new().await;

    let response = bearer(fx.server.post("/api/tickets"), &fx.admin)
        .json(&json!({ "title": "  Printer on fire ", "queue_id": 1 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["tn"], "202501011000001");
    assert_eq!(body["data"]["title"], "Printer on fire");
    assert_eq!(body["data"]["priority_id"], 3);
    let id = body["data"]["id"].as_i64().unwrap();

    let response = bearer(fx.server.post("/api/tickets"), &fx.admin)
        .json(&json!({ "title": "Second", "queue_id": 2 }))
        .await;
    assert_eq!(response.json::<Value>()["data"]["tn"], "202501011000002");

    let response = bearer(fx.server.get(&format!("/api/tickets/{id}")), &fx.customer).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["data"]["id"], id);

    let response = bearer(fx.server.get("/api/tickets/999"), &fx.customer).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ticket_create_rejections() {
    let fx = Fixture::new().await;

    let response = bearer(fx.server.post("/api/tickets"), &fx.admin)
        .json(&json!({ "title": "Nowhere", "queue_id": 77 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "VALIDATION_ERROR");

    let response = bearer(fx.server.post("/api/tickets"), &fx.admin)
        .json(&json!({ "title": "   ", "queue_id": 1 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = bearer(fx.server.post("/api/tickets"), &fx.customer)
        .json(&json!({ "title": "Read only", "queue_id": 1 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert!(fx.tickets.is_empty());
}

#[tokio::test]
async fn test_ticket_search_with_dynamic_field_filters() {
    let fx = Fixture::new().await;
    let mut ids = Vec::new();
    for title in ["One", "Two", "Three"] {
        let response = bearer(fx.server.post("/api/tickets"), &fx.admin)
            .json(&json!({ "title": title, "queue_id": 1 }))
            .await;
        ids.push(response.json::<Value>()["data"]["id"].as_i64().unwrap());
    }
    fx.tickets.set_field_value(ids[0], "Severity", "high");
    fx.tickets.set_field_value(ids[2], "Severity", "low");

    let response = bearer(fx.server.get("/api/tickets"), &fx.customer)
        .add_query_param("df_Severity", "high")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let data = response.json::<Value>()["data"].clone();
    assert_eq!(data.as_array().unwrap().len(), 1);
    assert_eq!(data[0]["id"], ids[0]);

    let response = bearer(fx.server.get("/api/tickets"), &fx.customer)
        .add_query_param("df_Severity_in", "high, low")
        .await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 2);

    let response = bearer(fx.server.get("/api/tickets"), &fx.customer)
        .add_query_param("limit", "1")
        .await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 1);

    let response = bearer(fx.server.get("/api/tickets"), &fx.customer)
        .add_query_param("df_Due_Date", "2025-01-01")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_self_service() {
    let fx = Fixture::new().await;

    let response = bearer(fx.server.get("/api/v1/tokens"), &fx.customer).await;
    let data = response.json::<Value>()["data"].clone();
    assert_eq!(data.as_array().unwrap().len(), 1);
    assert!(data[0].get("token_hash").is_none());

    let response = bearer(fx.server.post("/api/v1/tokens"), &fx.customer)
        .json(&json!({ "name": "ci", "scopes": ["admin:*"] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = bearer(fx.server.post("/api/v1/tokens"), &fx.customer)
        .json(&json!({ "name": "ci", "scopes": ["tickets:read"], "expires_in": "30d" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let created = response.json::<Value>()["data"].clone();
    let raw = created["token"].as_str().unwrap().to_string();
    assert!(raw.starts_with("hd_"));
    assert_eq!(created["expires_at"], "2025-01-31T00:00:00Z");

    // The new token works on its own
    let response = bearer(fx.server.get("/api/v1/tokens"), &raw).await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 2);

    let response = bearer(fx.server.get("/api/v1/tokens/scopes"), &fx.customer).await;
    let scopes = response.json::<Value>()["data"].clone();
    assert!(scopes.as_array().unwrap().iter().all(|s| s["scope"] != "admin:*"));

    let id = created["id"].as_i64().unwrap();
    let response = bearer(fx.server.delete(&format!("/api/v1/tokens/{id}")), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = bearer(fx.server.delete(&format!("/api/v1/tokens/{id}")), &fx.customer).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = bearer(fx.server.get("/api/v1/tokens"), &raw).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_token_oversight() {
    let fx = Fixture::new().await;

    let response = bearer(fx.server.get("/admin/tokens"), &fx.admin).await;
    let tokens = response.json::<Value>()["data"].clone();
    assert_eq!(tokens.as_array().unwrap().len(), 2);

    let customer_id = tokens
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["user_type"] == "customer")
        .and_then(|t| t["id"].as_i64())
        .unwrap();
    let response = bearer(fx.server.delete(&format!("/admin/tokens/{customer_id}")), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = bearer(fx.server.get("/api/v1/tokens"), &fx.customer).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = bearer(fx.server.get("/admin/tokens"), &fx.admin)
        .add_query_param("include_revoked", "false")
        .await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 1);

    let response = bearer(fx.server.get("/admin/tokens"), &fx.admin)
        .add_query_param("include_revoked", "true")
        .await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_ticket_number_debug() {
    let fx = Fixture::new().await;
    let response = bearer(fx.server.get("/admin/debug/ticket-number"), &fx.admin).await;
    assert_eq!(
        response.json::<Value>()["data"],
        json!({ "generator": "Date", "date_based": true })
    );
}

#[tokio::test]
async fn test_group_administration() {
    let fx = Fixture::new().await;

    let response = bearer(fx.server.post("/admin/groups"), &fx.admin)
        .json(&json!({ "name": " support ", "comments": "Support team" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let group = response.json::<Value>()["data"].clone();
    assert_eq!(group["name"], "support");
    let id = group["id"].as_i64().unwrap();

    let response = bearer(fx.server.post("/admin/groups"), &fx.admin)
        .json(&json!({ "name": "support" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let response = bearer(fx.server.get("/admin/groups"), &fx.admin)
        .add_query_param("search", "SUP")
        .await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 1);

    let response = bearer(fx.server.put(&format!("/admin/groups/{id}")), &fx.admin)
        .json(&json!({ "name": "support-l1" }))
        .await;
    assert_eq!(response.json::<Value>()["data"]["name"], "support-l1");

    let response = bearer(fx.server.get("/admin/groups"), &fx.admin)
        .add_query_param("search", "admin")
        .await;
    let admin_id = response.json::<Value>()["data"][0]["id"].as_i64().unwrap();
    let response = bearer(fx.server.delete(&format!("/admin/groups/{admin_id}")), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = bearer(fx.server.delete(&format!("/admin/groups/{id}")), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let response = bearer(fx.server.get(&format!("/admin/groups/{id}")), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_permissions_by_subject_and_group() {
    let fx = Fixture::new().await;
    let response = bearer(fx.server.get("/admin/groups"), &fx.admin)
        .add_query_param("search", "users")
        .await;
    let users_id = response.json::<Value>()["data"][0]["id"].as_i64().unwrap();

    let response = bearer(
        fx.server.put("/admin/permissions/customer-company/subjects/ACME"),
        &fx.admin,
    )
    .form(&[
        (format!("permissions[{users_id}][ro]"), "1"),
        (format!("permissions[{users_id}][owner]"), "1"),
    ])
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let data = response.json::<Value>()["data"].clone();
    assert_eq!(data["permissions"][users_id.to_string()], json!({ "ro": true }));
    assert_eq!(data["keys"], json!(["ro", "rw"]));

    let response = bearer(
        fx.server.get(&format!("/admin/permissions/customer-company/groups/{users_id}")),
        &fx.admin,
    )
    .await;
    assert_eq!(
        response.json::<Value>()["data"]["permissions"]["ACME"],
        json!({ "ro": true })
    );

    // Still referenced
    let response = bearer(fx.server.delete(&format!("/admin/groups/{users_id}")), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let response = bearer(
        fx.server.put(&format!("/admin/permissions/customer-company/groups/{users_id}")),
        &fx.admin,
    )
    .json(&json!({}))
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let response = bearer(fx.server.delete(&format!("/admin/groups/{users_id}")), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = bearer(fx.server.put("/admin/permissions/agent/subjects/bob"), &fx.admin)
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = bearer(fx.server.get("/admin/permissions/robots/subjects/1"), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = bearer(
        fx.server.put("/admin/permissions/customer-company/subjects/ACME"),
        &fx.admin,
    )
    .json(&json!({ "9999": { "ro": true } }))
    .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unscoped_agent_token_needs_admin_group() {
    let fx = Fixture::new().await;
    let agent = issue(&fx.tokens, 7, ApiTokenUserType::Agent, &[]).await;

    let response = bearer(fx.server.get("/admin/groups"), &agent).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = bearer(fx.server.get("/admin/groups"), &fx.admin)
        .add_query_param("search", "admin")
        .await;
    let admin_id = response.json::<Value>()["data"][0]["id"].as_i64().unwrap();

    let response = bearer(fx.server.put("/admin/permissions/agent/subjects/7"), &fx.admin)
        .json(&json!({ admin_id.to_string(): { "rw": true } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = bearer(fx.server.get("/admin/groups"), &agent).await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_postmaster_filters() {
    let fx = Fixture::new().await;
    let filter = json!({
        "name": "spam",
        "stop": true,
        "matches": [{ "key": "Subject", "value": "(?i)viagra", "not": false }],
        "sets": [{ "key": "X-Helpdesk-Ignore", "value": "yes" }]
    });

    let response = bearer(fx.server.post("/admin/postmaster-filters"), &fx.admin)
        .json(&filter)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let response = bearer(fx.server.post("/admin/postmaster-filters"), &fx.admin)
        .json(&filter)
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let response = bearer(fx.server.post("/admin/postmaster-filters"), &fx.admin)
        .json(&json!({ "name": "empty", "stop": false, "matches": [], "sets": [] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = bearer(fx.server.post("/admin/postmaster-filters/test"), &fx.admin)
        .json(&json!({ "message": "From: x@example.com\r\nSubject: Cheap VIAGRA\r\n\r\nbody" }))
        .await;
    let outcome = response.json::<Value>()["data"].clone();
    assert_eq!(outcome["matched"], json!(["spam"]));
    assert_eq!(outcome["stopped"], true);
    assert_eq!(outcome["annotations"]["ignore"], true);

    let response = bearer(fx.server.put("/admin/postmaster-filters/spam"), &fx.admin)
        .json(&json!({
            "name": "",
            "stop": false,
            "matches": [],
            "sets": [{ "key": "X-Helpdesk-Queue", "value": "Junk" }]
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["data"]["name"], "spam");

    let response = bearer(fx.server.delete("/admin/postmaster-filters/spam"), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let response = bearer(fx.server.delete("/admin/postmaster-filters/spam"), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generic_agent_jobs() {
    let fx = Fixture::new().await;

    let response = bearer(fx.server.post("/admin/generic-agent"), &fx.admin)
        .json(&json!({
            "name": "close-stale",
            "config": {
                "ScheduleHours[0]": "0",
                "ScheduleMinutes[0]": "0",
                "StateIDs": "1,4",
                "NewStateID": "2"
            }
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let job = response.json::<Value>()["data"].clone();
    assert_eq!(job["valid"], true);
    // The test clock sits at Wednesday 00:00
    assert_eq!(job["due_now"], true);
    assert_eq!(job["criteria"]["state_ids"], json!([1, 4]));
    assert_eq!(job["actions"]["new_state_id"], 2);

    let response = bearer(fx.server.put("/admin/generic-agent/close-stale"), &fx.admin)
        .json(&json!({ "new_name": "close-old", "valid": false }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let job = response.json::<Value>()["data"].clone();
    assert_eq!(job["name"], "close-old");
    assert_eq!(job["due_now"], false);

    let response = bearer(fx.server.get("/admin/generic-agent/close-stale"), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = bearer(fx.server.get("/admin/generic-agent"), &fx.admin).await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 1);

    let response = bearer(fx.server.delete("/admin/generic-agent/close-old"), &fx.admin).await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

const FIELDS_YAML: &str = r"
DynamicFields:
  Severity:
    Name: Severity
    Label: Severity
    FieldType: Dropdown
    ObjectType: Ticket
    FieldOrder: 3
    ValidID: 1
    Config:
      PossibleValues:
        high: High
        low: Low
  Broken:
    Name: Broken
    Label: Broken
    FieldType: Hologram
    ObjectType: Ticket
DynamicFieldScreens:
  Severity:
    AgentTicketZoom: 1
";

#[tokio::test]
async fn test_dynamic_field_import_export() {
    let fx = Fixture::new().await;

    let response = bearer(fx.server.post("/admin/dynamic-fields/import/preview"), &fx.admin)
        .text(FIELDS_YAML)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let preview = response.json::<Value>()["data"].clone();
    assert_eq!(preview[0]["name"], "Broken");
    assert_eq!(preview[1]["name"], "Severity");
    assert_eq!(preview[1]["will_create"], true);
    assert_eq!(preview[1]["screen_count"], 1);

    let response = bearer(fx.server.post("/admin/dynamic-fields/import"), &fx.admin)
        .json(&json!({
            "yaml": FIELDS_YAML,
            "fields": ["Severity", "Broken"],
            "screens": ["Severity"],
            "overwrite": false
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let result = response.json::<Value>()["data"].clone();
    assert_eq!(result["created"], json!(["Severity"]));
    assert_eq!(result["errors"].as_array().unwrap().len(), 1);
    assert_eq!(result["screens_ok"], 1);

    let response = bearer(fx.server.get("/admin/dynamic-fields/export"), &fx.admin)
        .add_query_param("names", "Severity")
        .add_query_param("screens", "true")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let yaml = response.text();
    assert!(yaml.contains("Severity"));
    assert!(yaml.contains("AgentTicketZoom"));

    let response = bearer(fx.server.get("/admin/dynamic-fields/search"), &fx.admin)
        .add_query_param("object_type", "Ticket")
        .await;
    let fields = response.json::<Value>()["data"].clone();
    assert_eq!(fields.as_array().unwrap().len(), 1);
    assert_eq!(fields[0]["options"], json!([["high", "High"], ["low", "Low"]]));

    let response = bearer(fx.server.get("/admin/dynamic-fields/search"), &fx.admin)
        .add_query_param("object_type", "Spaceship")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = bearer(fx.server.post("/admin/dynamic-fields/import/preview"), &fx.admin)
        .text("DynamicFieldScreens: {}\n")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}
