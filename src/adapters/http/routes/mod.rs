pub mod billing;
pub mod billing_webhooks;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/billing", billing::router().merge(billing_webhooks::router()))
}
