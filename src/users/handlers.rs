use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    error::ApiError,
    state::AppState,
    users::{
        dto::{
            ActiveResponse, ChangeEmailRequest, ChangePasswordRequest, CreateUserRequest,
            CreatedResponse, FilterQuery, IdQuery, LoginRequest, LoginResponse, MessageResponse,
            UpdateUserRequest, UserResponse,
        },
        services::UserService,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            post(create).get(get_all).put(update).delete(delete),
        )
        .route("/user", get(get_one))
        .route("/users/filter", get(find))
        .route("/users/activate", put(activate))
        .route("/users/active", get(is_active))
        .route("/users/email", put(change_email))
        .route("/users/password", put(change_password))
        .route("/login", post(login))
}

fn required_param(param: &'static str, value: Option<String>) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::parameter(param, "empty value"))
}

fn required_id(query: IdQuery) -> Result<u64, ApiError> {
    required_param("id", query.id)?
        .parse()
        .map_err(|e: std::num::ParseIntError| ApiError::parameter("id", e.to_string()))
}

#[instrument(skip(users, payload))]
pub async fn create(
    State(users): State<UserService>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let Json(req) = payload?;
    let user = users.create(req.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "user created successfully".into(),
            id: user.id,
        }),
    ))
}

#[instrument(skip(users))]
pub async fn get_one(
    State(users): State<UserService>,
    Query(query): Query<IdQuery>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = required_id(query)?;
    Ok(Json(users.get(id).await?.into()))
}

#[instrument(skip(users))]
pub async fn get_all(
    State(users): State<UserService>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let all = users.get_all().await?;
    Ok(Json(all.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(users))]
pub async fn find(
    State(users): State<UserService>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let filter = required_param("filter", query.filter)?;
    let value = required_param("value", query.value)?;
    let found = users.find(&filter, &value).await?;
    Ok(Json(found.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(users, payload))]
pub async fn update(
    State(users): State<UserService>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    let user = users.update(req.into()).await?;
    Ok(Json(MessageResponse::new(format!(
        "user {} updated successfully",
        user.id
    ))))
}

#[instrument(skip(users))]
pub async fn delete(
    State(users): State<UserService>,
    Query(query): Query<IdQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = required_id(query)?;
    users.delete(id).await?;
    Ok(Json(MessageResponse::new(format!(
        "user {id} deleted successfully"
    ))))
}

#[instrument(skip(users))]
pub async fn activate(
    State(users): State<UserService>,
    Query(query): Query<IdQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = required_id(query)?;
    users.activate(id).await?;
    Ok(Json(MessageResponse::new(format!("user {id} activated"))))
}

#[instrument(skip(users))]
pub async fn is_active(
    State(users): State<UserService>,
    Query(query): Query<IdQuery>,
) -> Result<Json<ActiveResponse>, ApiError> {
    let id = required_id(query)?;
    let active = users.is_active(id).await?;
    Ok(Json(ActiveResponse { id, active }))
}

#[instrument(skip(users, payload))]
pub async fn change_email(
    State(users): State<UserService>,
    payload: Result<Json<ChangeEmailRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    users.change_email(req.id, &req.email).await?;
    Ok(Json(MessageResponse::new(format!(
        "user {} email changed",
        req.id
    ))))
}

#[instrument(skip(users, payload))]
pub async fn change_password(
    State(users): State<UserService>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    users.change_passwd(req.id, &req.password).await?;
    Ok(Json(MessageResponse::new(format!(
        "user {} password changed",
        req.id
    ))))
}

#[instrument(skip(users, payload))]
pub async fn login(
    State(users): State<UserService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;
    let user = users.validate_login(&req.username, &req.password).await?;
    info!(user_id = user.id, "login succeeded");
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt; // For oneshot()

    use crate::{
        app::build_app,
        config::AppConfig,
        error::ErrorBody,
        state::AppState,
        users::{
            dto::{LoginResponse, UserResponse},
            password::{Argon2Hasher, CredentialHasher},
            services::UserService,
            testing::{sample_user, MemoryStore},
        },
    };

    fn app_with(store: Arc<MemoryStore>) -> Router {
        let config = Arc::new(AppConfig::from_lookup(|_| None).unwrap());
        let users = UserService::new(
            store,
            Arc::new(Argon2Hasher::fast()),
            Duration::from_secs(1),
        );
        build_app(AppState::from_parts(config, users))
    }

    async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn healthz_answers_ok() {
        let app = app_with(Arc::new(MemoryStore::new()));
        let (status, body) = send(app, "GET", "/api/v0/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OK");
    }

    #[tokio::test]
    async fn create_then_fetch() {
        let store = Arc::new(MemoryStore::new());
        let (status, body) = send(
            app_with(store.clone()),
            "POST",
            "/api/v0/users",
            Some(json!({
                "first_name": "Laura",
                "last_name": "Field",
                "email": "laura@example.com",
                "birthday": "1990-04-12",
                "username": "lfield",
                "password": "s3cret!"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 1);

        let (status, body) = send(app_with(store), "GET", "/api/v0/user?id=1", None).await;
        assert_eq!(status, StatusCode::OK);
        let user: UserResponse = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(user.username, "lfield");
        assert!(body.get("passwd").is_none());
        assert!(body.get("password").is_none());
    }

    #[tokio::test]
    async fn create_with_bad_email_is_service_error() {
        let (status, body) = send(
            app_with(Arc::new(MemoryStore::new())),
            "POST",
            "/api/v0/users",
            Some(json!({
                "first_name": "Laura",
                "last_name": "Field",
                "email": "laura@",
                "username": "lfield",
                "password": "s3cret!"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorBody = serde_json::from_value(body).unwrap();
        assert_eq!(err.code, 400);
        assert_eq!(err.status, "ServiceError");
        assert!(err.message.contains("Email"));
    }

    #[tokio::test]
    async fn malformed_payload_is_unsupported_media_type() {
        let app = app_with(Arc::new(MemoryStore::new()));
        let request = Request::builder()
            .method("POST")
            .uri("/api/v0/users")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let err: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err.status, "ControllerPayloadError");
    }

    #[tokio::test]
    async fn id_parameter_checks() {
        let store = Arc::new(MemoryStore::new());
        let (status, body) = send(app_with(store.clone()), "GET", "/api/v0/user", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "ControllerParameterError");

        let app = app_with(store.clone());
        let (status, _) = send(app, "GET", "/api/v0/user?id=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let app = app_with(store.clone());
        let (status, body) = send(app, "GET", "/api/v0/user?id=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "ServiceError");

        let (status, body) = send(app_with(store), "GET", "/api/v0/user?id=42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "RepositoryError");
    }

    #[tokio::test]
    async fn filter_route() {
        let store = Arc::new(MemoryStore::with_users(vec![
            sample_user(1, "Laura", "Field", "lfield"),
            sample_user(2, "Lisa", "Field", "lisa"),
        ]));

        let (status, body) = send(
            app_with(store.clone()),
            "GET",
            "/api/v0/users/filter?filter=LastName&value=Field",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));

        let (status, body) = send(
            app_with(store.clone()),
            "GET",
            "/api/v0/users/filter?filter=Bogus&value=x",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "ServiceError");

        let (status, body) = send(
            app_with(store),
            "GET",
            "/api/v0/users/filter?filter=Email",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "ControllerParameterError");
    }

    #[tokio::test]
    async fn update_activate_and_delete() {
        let store = Arc::new(MemoryStore::with_users(vec![sample_user(
            1, "Laura", "Field", "lfield",
        )]));

        let (status, _) = send(
            app_with(store.clone()),
            "PUT",
            "/api/v0/users",
            Some(json!({ "id": 1, "first_name": "Lisa" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            app_with(store.clone()),
            "PUT",
            "/api/v0/users",
            Some(json!({ "id": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let app = app_with(store.clone());
        let (status, _) = send(app, "PUT", "/api/v0/users/activate?id=1", None).await;
        assert_eq!(status, StatusCode::OK);

        let app = app_with(store.clone());
        let (_, body) = send(app, "GET", "/api/v0/users/active?id=1", None).await;
        assert_eq!(body, json!({ "id": 1, "active": true }));

        let (_, body) = send(app_with(store.clone()), "GET", "/api/v0/users", None).await;
        assert_eq!(body[0]["first_name"], "Lisa");
        assert_eq!(body[0]["last_name"], "Field");

        let app = app_with(store.clone());
        let (status, _) = send(app, "DELETE", "/api/v0/users?id=1", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(app_with(store), "DELETE", "/api/v0/users?id=1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn change_email_and_password() {
        let store = Arc::new(MemoryStore::with_users(vec![sample_user(
            1, "Laura", "Field", "lfield",
        )]));

        let (status, _) = send(
            app_with(store.clone()),
            "PUT",
            "/api/v0/users/email",
            Some(json!({ "id": 1, "email": "bad" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            app_with(store.clone()),
            "PUT",
            "/api/v0/users/email",
            Some(json!({ "id": 1, "email": "laura@field.dev" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            app_with(store.clone()),
            "PUT",
            "/api/v0/users/password",
            Some(json!({ "id": 1, "password": "brand-new" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            app_with(store),
            "POST",
            "/api/v0/login",
            Some(json!({ "username": "lfield", "password": "brand-new" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "laura@field.dev");
    }

    #[tokio::test]
    async fn login_flow() {
        let mut user = sample_user(1, "Uno", "User", "user1");
        user.passwd = Argon2Hasher::fast().hash("rightpass").unwrap();
        let store = Arc::new(MemoryStore::with_users(vec![user]));

        let (status, body) = send(
            app_with(store.clone()),
            "POST",
            "/api/v0/login",
            Some(json!({ "username": "user1", "password": "wrongpass" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "ServiceError");

        let (status, _) = send(
            app_with(store.clone()),
            "POST",
            "/api/v0/login",
            Some(json!({ "username": "ghost", "password": "anything" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            app_with(store),
            "POST",
            "/api/v0/login",
            Some(json!({ "username": "user1", "password": "rightpass" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let login: LoginResponse = serde_json::from_value(body).unwrap();
        assert_eq!(login.id, 1);
        assert!(login.last_login.is_some());
    }

    #[tokio::test]
    async fn login_against_corrupt_hash_is_internal_error() {
        let mut user = sample_user(1, "Uno", "User", "user1");
        user.passwd = "not-a-hash".into();
        let store = Arc::new(MemoryStore::with_users(vec![user]));

        let (status, body) = send(
            app_with(store),
            "POST",
            "/api/v0/login",
            Some(json!({ "username": "user1", "password": "whatever" })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let err: ErrorBody = serde_json::from_value(body).unwrap();
        assert_eq!(err.code, 500);
        assert_eq!(err.status, "ServiceError");
        assert_eq!(err.message, "internal error");
    }
}
