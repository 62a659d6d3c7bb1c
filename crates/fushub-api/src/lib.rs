pub mod auth;
pub mod bookings;
pub mod conversations;
pub mod dashboard;
pub mod error;
pub mod favorites;
pub mod filter;
pub mod listings;
pub mod mapping;
pub mod middleware;
pub mod profiles;
pub mod realtime;
pub mod reviews;
pub mod stats;
pub mod storage;
pub mod uploads;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use tokio_util::sync::CancellationToken;
use tracing::error;

use fushub_db::Database;
use fushub_realtime::Dispatcher;

use crate::error::{ApiError, ApiResult};
use crate::storage::{MAX_UPLOAD_SIZE, Storage};

/// Transport cap for upload bodies. Kept above `MAX_UPLOAD_SIZE` so slightly
/// oversized images get the typed 413 from the handler.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_SIZE + 1024 * 1024;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub storage: Storage,
    /// Cancelled on server shutdown; realtime connections hang off it.
    pub shutdown: CancellationToken,
}

/// Run blocking or CPU-heavy work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })?
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn db_call<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    blocking(move || f(&state.db).map_err(ApiError::from)).await
}

/// Every `/api` route. Public routes are reachable without a session;
/// the rest go through [`middleware::require_auth`].
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/profiles/{id}", get(profiles::get_profile))
        .route("/listings", get(listings::browse))
        .route("/listings/{id}", get(listings::get_listing))
        .route("/listings/{id}/reviews", get(reviews::list_reviews))
        .route("/stats", get(stats::get_stats));

    let protected = Router::new()
        .route("/auth/signout", post(auth::signout))
        .route("/me", get(auth::me))
        .route("/me/profile", put(profiles::update_profile))
        .route("/me/listings", get(listings::my_listings))
        .route("/me/favorites", get(favorites::favorite_listings))
        .route("/me/favorites/ids", get(favorites::favorite_ids))
        .route("/me/bookings", get(bookings::my_bookings))
        .route("/me/dashboard", get(dashboard::owner_dashboard))
        .route("/listings", post(listings::create_listing))
        .route(
            "/listings/{id}",
            axum::routing::patch(listings::update_listing).delete(listings::delete_listing),
        )
        .route("/listings/{id}/availability", put(listings::set_availability))
        .route("/listings/{id}/favorite", post(favorites::toggle_favorite))
        .route("/listings/{id}/reviews", post(reviews::create_review))
        .route("/listings/{id}/reviews/eligibility", get(reviews::eligibility))
        .route("/listings/{id}/bookings", post(bookings::request_booking))
        .route("/bookings/{id}/status", put(bookings::update_status))
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::start_conversation),
        )
        .route("/conversations/{id}", get(conversations::select_conversation))
        .route("/conversations/{id}/read", post(conversations::mark_read))
        .route("/conversations/{id}/messages", post(conversations::send_message))
        .route("/messages/unread", get(conversations::unread_notifications))
        .route(
            "/storage/{bucket}",
            post(uploads::upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/storage/{bucket}/{*path}", delete(uploads::delete_object))
        .route_layer(from_fn_with_state(state, middleware::require_auth));

    public.merge(protected)
}
