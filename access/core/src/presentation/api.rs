// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Role Administration HTTP API
//!
//! | Method | Path | Permission |
//! |--------|------|------------|
//! | GET | `/roles` | `users:read` |
//! | GET | `/roles/permissions` | `users:read` |
//! | GET | `/roles/{name}/permissions` | `users:read` |
//! | POST | `/roles/custom` | `users:create` |
//! | PUT | `/roles/custom/{name}` | `users:update` |
//! | DELETE | `/roles/custom/{name}` | `users:delete` |
//!
//! The authenticated [`Principal`] is read from a request extension, which
//! the authentication layer in front of this router inserts. For trusted
//! deployments behind an authenticating proxy, [`principal_from_header`]
//! fills that extension from the `x-storegate-principal` header.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error};

use crate::application::role_admin::{RoleAdminError, RoleAdministrationService, RoleView};
use crate::domain::errors::AccessError;
use crate::domain::permission::PermissionId;
use crate::domain::principal::Principal;

pub struct AdminState {
    pub roles: Arc<RoleAdministrationService>,
}

pub fn admin_router(roles: Arc<RoleAdministrationService>) -> Router {
    let state = Arc::new(AdminState { roles });

    Router::new()
        .route("/roles", get(list_roles))
        .route("/roles/permissions", get(list_permissions))
        .route("/roles/{name}/permissions", get(role_permissions))
        .route("/roles/custom", post(create_custom_role))
        .route(
            "/roles/custom/{name}",
            put(update_custom_role).delete(delete_custom_role),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct CustomRoleCreate {
    pub role_name: String,
    pub permissions: BTreeSet<PermissionId>,
}

#[derive(Debug, Deserialize)]
pub struct CustomRoleUpdate {
    pub permissions: BTreeSet<PermissionId>,
}

/// HTTP status for a request-time access failure.
pub fn access_status(err: &AccessError) -> StatusCode {
    match err {
        AccessError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        AccessError::NotFound { .. } => StatusCode::NOT_FOUND,
        AccessError::ValidationFail(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AccessError::ConflictFail { .. } => StatusCode::CONFLICT,
        AccessError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = access_status(&self);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {}", self);
            return error_body(status, "internal error".to_string());
        }
        error_body(status, self.to_string())
    }
}

impl IntoResponse for RoleAdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            RoleAdminError::Access(err) => access_status(err),
            RoleAdminError::RoleNotFound(_) => StatusCode::NOT_FOUND,
            RoleAdminError::RoleAlreadyExists(_) | RoleAdminError::RoleInUse { .. } => StatusCode::CONFLICT,
            RoleAdminError::BuiltinRoleImmutable(_) | RoleAdminError::Catalog(_) => StatusCode::BAD_REQUEST,
            RoleAdminError::Lookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("role administration failed: {}", self);
            return error_body(status, "internal error".to_string());
        }
        error_body(status, self.to_string())
    }
}

pub const PRINCIPAL_HEADER: &str = "x-storegate-principal";

/// Middleware that decodes a JSON [`Principal`] from [`PRINCIPAL_HEADER`]
/// into a request extension. Missing or malformed headers get 401.
pub async fn principal_from_header(mut request: Request, next: Next) -> Response {
    let Some(raw) = request.headers().get(PRINCIPAL_HEADER) else {
        return error_body(StatusCode::UNAUTHORIZED, "missing principal".to_string());
    };
    let principal = match raw
        .to_str()
        .ok()
        .and_then(|s| serde_json::from_str::<Principal>(s).ok())
    {
        Some(principal) => principal,
        None => {
            debug!("rejecting malformed {} header", PRINCIPAL_HEADER);
            return error_body(StatusCode::UNAUTHORIZED, "malformed principal".to_string());
        }
    };
    request.extensions_mut().insert(principal);
    next.run(request).await
}

async fn list_roles(
    State(state): State<Arc<AdminState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<BTreeMap<String, Vec<PermissionId>>>, RoleAdminError> {
    let roles = state.roles.list_roles(&principal)?;
    Ok(Json(roles.into_iter().map(|r| (r.name, r.permissions)).collect()))
}

async fn list_permissions(
    State(state): State<Arc<AdminState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<PermissionId>>, RoleAdminError> {
    Ok(Json(state.roles.list_permissions(&principal)?))
}

async fn role_permissions(
    State(state): State<Arc<AdminState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> Result<Json<Vec<PermissionId>>, RoleAdminError> {
    Ok(Json(state.roles.role_permissions(&principal, &name)?.permissions))
}

async fn create_custom_role(
    State(state): State<Arc<AdminState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CustomRoleCreate>,
) -> Result<(StatusCode, Json<RoleView>), RoleAdminError> {
    let role = state.roles.create_custom_role(
        &principal,
        &payload.role_name,
        payload.permissions.into_iter().collect(),
    )?;
    Ok((StatusCode::CREATED, Json(role)))
}

async fn update_custom_role(
    State(state): State<Arc<AdminState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
    Json(payload): Json<CustomRoleUpdate>,
) -> Result<Json<RoleView>, RoleAdminError> {
    let role = state
        .roles
        .update_custom_role(&principal, &name, payload.permissions.into_iter().collect())?;
    Ok(Json(role))
}

async fn delete_custom_role(
    State(state): State<Arc<AdminState>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> Result<Json<RoleView>, RoleAdminError> {
    Ok(Json(state.roles.delete_custom_role(&principal, &name).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bootstrap::standard_catalog;
    use crate::application::guard::AccessGuard;
    use crate::application::role_admin::StaticRoleAssignments;
    use crate::domain::permission::BuiltinRole;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(principal: Principal) -> Router {
        app_with(principal, StaticRoleAssignments::new().with_count("busy", 3))
    }

    fn app_with(principal: Principal, assignments: StaticRoleAssignments) -> Router {
        let catalog = Arc::new(standard_catalog().unwrap());
        catalog
            .register_custom_role("busy", [PermissionId::parse("sales:refund").unwrap()])
            .unwrap();
        let service =
            RoleAdministrationService::new(AccessGuard::new(catalog), Arc::new(assignments)).unwrap();
        admin_router(Arc::new(service)).layer(Extension(principal))
    }

    fn admin() -> Principal {
        Principal::new("admin-1", BuiltinRole::Admin)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_roles() {
        let response = app(admin())
            .oneshot(Request::get("/roles").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert!(body["cashier"].as_array().unwrap().contains(&json!("sales:create")));
        assert_eq!(body["busy"], json!(["sales:refund"]));
    }

    #[tokio::test]
    async fn test_cashier_is_forbidden() {
        let cashier = Principal::new("c-1", BuiltinRole::Cashier);
        let response = app(cashier)
            .oneshot(Request::get("/roles/permissions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("users:read"));
    }

    #[tokio::test]
    async fn test_unknown_role_is_not_found() {
        let response = app(admin())
            .oneshot(Request::get("/roles/ghost/permissions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_then_conflict() {
        let app = app(admin());
        let payload = json!({ "role_name": "stocker", "permissions": ["inventory:create"] });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/roles/custom", payload.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["name"], "stocker");
        assert_eq!(body["builtin"], false);

        let response = app
            .oneshot(json_request("POST", "/roles/custom", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_builtin_roles_are_immutable() {
        let response = app(admin())
            .oneshot(json_request("PUT", "/roles/custom/manager", json!({ "permissions": [] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_role_in_use_conflicts() {
        let response = app(admin())
            .oneshot(Request::delete("/roles/custom/busy").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app_with(admin(), StaticRoleAssignments::new())
            .oneshot(Request::delete("/roles/custom/busy").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["permissions"], json!(["sales:refund"]));
    }

    fn header_app() -> Router {
        let catalog = Arc::new(standard_catalog().unwrap());
        let service =
            RoleAdministrationService::new(AccessGuard::new(catalog), Arc::new(StaticRoleAssignments::new()))
                .unwrap();
        admin_router(Arc::new(service)).layer(axum::middleware::from_fn(principal_from_header))
    }

    #[tokio::test]
    async fn test_principal_header_is_decoded() {
        let header = serde_json::to_string(&admin()).unwrap();
        let response = header_app()
            .oneshot(
                Request::get("/roles/permissions")
                    .header(PRINCIPAL_HEADER, header)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_principal_is_unauthorized() {
        let response = header_app()
            .oneshot(Request::get("/roles").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = header_app()
            .oneshot(
                Request::get("/roles")
                    .header(PRINCIPAL_HEADER, "{not json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_access_status_mapping() {
        assert_eq!(
            access_status(&AccessError::ValidationFail("bad".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            access_status(&AccessError::ConflictFail {
                resource: "product".into(),
                id: "1".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            access_status(&AccessError::Storage("db down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
