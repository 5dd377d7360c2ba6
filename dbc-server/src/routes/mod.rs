//! API route modules.

pub mod access;
pub mod connections;
pub mod exceptions;
pub mod health;
pub mod masking;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/health", get(health::health_check));

    let api_routes = Router::new()
        .merge(connections::router())
        .merge(masking::router())
        .merge(access::router())
        .merge(exceptions::router());

    Router::new()
        .merge(public_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::USER_ID_HEADER;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use dbc_core::Database;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let db = Database::open_in_memory().unwrap();
        create_router(AppState::new(Config::default(), db))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
        user: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header(USER_ID_HEADER, user);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["database"], true);
    }

    #[tokio::test]
    async fn test_uri_parse_and_build() {
        let app = test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/connections/uri/build",
            Some(json!({"dbType": "postgres", "host": "db.local", "port": "5432", "user": "admin", "database": "app"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["uri"], "postgresql://admin@db.local:5432/app");

        let (_, body) = send(
            &app,
            "POST",
            "/api/connections/uri/parse",
            Some(json!({"uri": "postgresql://admin@db.local:5432/app"})),
            None,
        )
        .await;
        assert_eq!(body["host"], "db.local");
        assert_eq!(body["database"], "app");

        let (status, body) = send(
            &app,
            "POST",
            "/api/connections/uri/parse",
            Some(json!({"uri": "not a uri"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_sync_config() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/connections/sync-config", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fieldsDebounceMs"], 100);
        assert_eq!(body["uriDebounceMs"], 150);
    }

    #[tokio::test]
    async fn test_connection_crud() {
        let app = test_app();

        let (status, created) = send(
            &app,
            "POST",
            "/api/connections",
            Some(json!({"name": "primary", "dbType": "mysql", "uri": "mysql://root@db:3306/shop"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["host"], "db");
        assert_eq!(created["database"], "shop");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, fetched) = send(&app, "GET", &format!("/api/connections/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["uri"], "mysql://root@db:3306/shop");

        let (status, _) = send(&app, "DELETE", &format!("/api/connections/{id}"), None, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, "GET", &format!("/api/connections/{id}"), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));

        let (status, _) = send(
            &app,
            "POST",
            "/api/connections",
            Some(json!({"name": "", "dbType": "mysql"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_masking_patterns() {
        let app = test_app();

        let (status, _) = send(
            &app,
            "POST",
            "/api/masking-patterns",
            Some(json!({"name": "Broken", "maskingType": "PARTIAL"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(
            &app,
            "POST",
            "/api/masking-patterns/preview",
            Some(json!({
                "maskingType": "PARTIAL",
                "maskingArgs": "{\"start\":2,\"end\":2}",
                "value": "4111111111111111"
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["masked"], "41************11");

        let (status, pattern) = send(
            &app,
            "POST",
            "/api/masking-patterns",
            Some(json!({"name": "Redact", "maskingType": "REDACT"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let pattern_id = pattern["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "POST",
            "/api/policies",
            Some(json!({
                "name": "mask",
                "subjectType": "ROLE",
                "subjectId": "analyst",
                "privilegeCode": "READ",
                "maskingPolicyId": pattern_id
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/masking-patterns/{pattern_id}"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_reactivating_policy_with_deleted_pattern_conflicts() {
        let app = test_app();
        let (_, pattern) = send(
            &app,
            "POST",
            "/api/masking-patterns",
            Some(json!({"name": "Redact", "maskingType": "REDACT"})),
            None,
        )
        .await;
        let pattern_id = pattern["id"].as_str().unwrap().to_string();

        let (status, policy) = send(
            &app,
            "POST",
            "/api/policies",
            Some(json!({
                "name": "masked",
                "subjectType": "USER",
                "subjectId": "alice",
                "privilegeCode": "READ",
                "maskingPolicyId": pattern_id,
                "isActive": false
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let policy_id = policy["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/masking-patterns/{pattern_id}"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/api/policies/{policy_id}"),
            Some(json!({"isActive": true})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains(&pattern_id));
    }

    #[tokio::test]
    async fn test_evaluate_with_role_and_column_masking() {
        let app = test_app();

        let (_, table) = send(
            &app,
            "POST",
            "/api/resources",
            Some(json!({"databaseId": "crm", "schemaName": "public", "tableName": "users"})),
            None,
        )
        .await;
        let (_, email) = send(
            &app,
            "POST",
            "/api/resources",
            Some(json!({"databaseId": "crm", "schemaName": "public", "tableName": "users", "columnName": "email"})),
            None,
        )
        .await;
        let (_, role) = send(&app, "POST", "/api/roles", Some(json!({"name": "analyst"})), None).await;
        let role_id = role["id"].as_str().unwrap();

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/roles/{role_id}/members"),
            Some(json!({"userId": "alice"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, pattern) = send(
            &app,
            "POST",
            "/api/masking-patterns",
            Some(json!({"name": "Redact", "maskingType": "REDACT"})),
            None,
        )
        .await;

        for policy in [
            json!({"name": "read users", "subjectType": "ROLE", "subjectId": role_id,
                   "privilegeCode": "READ", "resourceId": table["id"]}),
            json!({"name": "mask email", "subjectType": "ROLE", "subjectId": role_id,
                   "privilegeCode": "READ", "resourceId": email["id"], "maskingPolicyId": pattern["id"]}),
        ] {
            let (status, _) = send(&app, "POST", "/api/policies", Some(policy), None).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(
            &app,
            "POST",
            "/api/access/evaluate",
            Some(json!({
                "subject": {"type": "USER", "id": "alice"},
                "resource": {"databaseId": "crm", "schemaName": "public", "tableName": "users"},
                "privilege": "READ",
                "columns": ["email", "name"]
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["decision"]["allowed"], true);
        assert_eq!(body["columns"][0]["name"], "email");
        assert_eq!(body["columns"][0]["maskingType"], "REDACT");
        assert_eq!(body["columns"][1]["allowed"], true);

        // Someone without a role is denied by default.
        let (_, body) = send(
            &app,
            "POST",
            "/api/access/evaluate",
            Some(json!({
                "subject": {"type": "USER", "id": "mallory"},
                "resource": {"databaseId": "crm", "schemaName": "public", "tableName": "users"},
                "privilege": "READ"
            })),
            None,
        )
        .await;
        assert_eq!(body["decision"]["allowed"], false);
        assert_eq!(body["decision"]["reason"], "NO_MATCHING_POLICY");

        let (status, audits) =
            send(&app, "GET", "/api/access/audits?userId=alice", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(audits.as_array().unwrap().len(), 1);
        assert_eq!(audits[0]["resourceId"], table["id"]);
    }

    #[tokio::test]
    async fn test_exception_lifecycle() {
        let app = test_app();
        let request = json!({
            "subjectType": "USER",
            "subjectId": "bob",
            "overridePrivilege": "READ",
            "purpose": "incident 42",
            "startTime": "2026-01-01T00:00:00Z",
            "endTime": "2026-01-02T00:00:00Z"
        });

        let (status, _) = send(&app, "POST", "/api/exceptions", Some(request.clone()), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, created) =
            send(&app, "POST", "/api/exceptions", Some(request), Some("bob")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "PENDING");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, approved) = send(
            &app,
            "POST",
            &format!("/api/exceptions/{id}/approve"),
            Some(json!({"context": "ok for the incident"})),
            Some("carol"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["status"], "APPROVED");
        assert_eq!(approved["approvedBy"], "carol");

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/exceptions/{id}/reject"),
            None,
            Some("carol"),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, revoked) = send(
            &app,
            "POST",
            &format!("/api/exceptions/{id}/revoke"),
            None,
            Some("carol"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(revoked["effectiveStatus"], "REVOKED");

        let (_, detail) = send(&app, "GET", &format!("/api/exceptions/{id}"), None, None).await;
        assert_eq!(detail["audits"].as_array().unwrap().len(), 3);

        let (_, listed) = send(&app, "GET", "/api/exceptions?status=REVOKED", None, None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "GET", "/api/exceptions?status=bogus", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
