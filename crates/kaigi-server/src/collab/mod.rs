pub mod feed;
pub mod presence;

use axum::Router;

use crate::AppState;

pub use feed::FeedHub;

/// Create the realtime (WebSocket) router
pub fn router() -> Router<AppState> {
    Router::new().merge(feed::router()).merge(presence::router())
}
