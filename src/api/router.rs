//! HTTP router.
//!
//! One static chat page at `/`, the JSON API under `/api/`.
//! Login and health are unprotected; everything else requires a
//! bearer token issued by `/api/auth/login`.

use axum::extract::DefaultBodyLimit;
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

pub fn api_router(ctx: ApiContext) -> Router {
    // Protected routes. Extension must be outermost so the auth
    // middleware can access ApiContext.
    let protected = Router::new()
        .route("/chat/history", get(endpoints::chat::history))
        .route(
            "/chat/send",
            post(endpoints::chat::send)
                .layer(DefaultBodyLimit::max(endpoints::chat::MAX_UPLOAD_BYTES)),
        )
        .route("/chat/reset", post(endpoints::chat::reset))
        .route("/auth/logout", post(endpoints::auth::logout))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::require_auth))
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx);

    Router::new()
        .route("/", get(index))
        .nest("/api", protected.merge(unprotected))
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}
