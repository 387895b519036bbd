mod ai;
mod health;
mod meetings;
mod rows;

use axum::Router;

use crate::AppState;

/// Create the API router
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(meetings::router())
        .merge(rows::router())
        .merge(ai::router())
}

pub(crate) use ai::{generate_insights_for, generate_report_for};
