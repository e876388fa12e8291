// Axum test fixture - a small user API with controller-style handlers
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct StoreUserRequest {
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl StoreUserRequest {
    pub fn rules() -> Vec<(&'static str, &'static str)> {
        vec![
            ("name", "required|string|max:255"),
            ("email", "required|email"),
            // nested role names
            ("roles.*", "string"),
        ]
    }
}

pub struct UserResource;

pub struct AppState;

pub struct UserController;

impl UserController {
    /// List users.
    pub async fn index(Query(query): Query<ListQuery>) -> Json<Vec<UserResource>> {
        Json(vec![])
    }

    /// Create a user.
    ///
    /// Sends a welcome email.
    pub async fn store(State(state): State<AppState>, Json(body): Json<StoreUserRequest>) -> Json<UserResource> {
        Json(UserResource)
    }

    /// Show a user.
    pub async fn show(Path(user): Path<u32>) -> Json<UserResource> {
        Json(UserResource)
    }

    pub async fn destroy(Path(user): Path<u32>) -> StatusCode {
        StatusCode::NO_CONTENT
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn telescope() -> &'static str {
    "debug"
}

async fn require_auth() {}

fn api_routes() -> Router {
    Router::new()
        .route("/users", get(UserController::index).post(UserController::store))
        .route("/users/:user", get(UserController::show).delete(UserController::destroy))
        .route_layer(middleware::from_fn(require_auth))
        .route("/health-check", get(health))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(|| async { "welcome" }))
        .nest("/api/v1", api_routes())
        .route("/telescope/requests", get(telescope))
}

#[tokio::main]
async fn main() {
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    axum::serve(listener, app()).await.unwrap();
}
