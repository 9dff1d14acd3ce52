//! Stripe webhook endpoint.
//!
//! Signature verification runs over the exact raw body bytes before any
//! parsing. Handler failures are classified by `should_retry`; everything
//! it declines is logged and acknowledged with 200 so the processor does
//! not redeliver the event.

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use secrecy::ExposeSecret;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::billing_events::{HandlerError, should_retry},
    infra::stripe_client::StripeClient,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(handle_webhook))
}

/// POST /api/billing/webhook
async fn handle_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let webhook_secret = app_state
        .config
        .billing
        .stripe_webhook_secret
        .expose_secret()
        .to_string();
    if webhook_secret.is_empty() {
        return Err(AppError::MisconfiguredWebhook);
    }

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    StripeClient::verify_webhook_signature(&body, signature, &webhook_secret)?;

    let event: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;

    let event_type = event["type"].as_str().unwrap_or("");
    let event_id = event["id"].as_str().unwrap_or("");
    let object = &event["data"]["object"];

    let result = match event_type {
        "checkout.session.completed" => {
            app_state
                .webhook_use_cases
                .handle_checkout_completed(object)
                .await
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            app_state
                .webhook_use_cases
                .handle_subscription_updated(object)
                .await
        }
        "customer.subscription.deleted" => {
            app_state
                .webhook_use_cases
                .handle_subscription_deleted(object)
                .await
        }
        // Only invoices tied to a subscription matter here; one-off
        // invoices carry no subscription reference and are skipped.
        "invoice.paid" => {
            if object["subscription"].as_str().is_some() {
                app_state.webhook_use_cases.handle_invoice_paid(object).await
            } else {
                tracing::debug!(event_id, "invoice.paid without subscription reference");
                Ok(())
            }
        }
        _ => {
            tracing::debug!(event_type, event_id, "Unhandled webhook event type");
            Ok(())
        }
    };

    if let Err(error) = result {
        if should_retry(&error) {
            tracing::error!(
                error = %error,
                event_type,
                event_id,
                retryable = true,
                "Webhook processing failed, returning 500 for Stripe retry"
            );
            return Err(AppError::Internal(error.to_string()));
        }
        log_acknowledged_failure(&error, event_type, event_id);
    }

    Ok(Json(serde_json::json!({ "received": true })))
}

fn log_acknowledged_failure(error: &HandlerError, event_type: &str, event_id: &str) {
    match error {
        // Expected race: the webhook can arrive before our record carries
        // the customer id. Stripe would redeliver forever, so acknowledge.
        HandlerError::CorrelationMiss { customer_id } => tracing::warn!(
            customer_id = %customer_id,
            event_type,
            event_id,
            retryable = false,
            "No subscription record for customer, acknowledging"
        ),
        _ => tracing::warn!(
            error = %error,
            event_type,
            event_id,
            retryable = false,
            "Webhook event failed, acknowledging"
        ),
    }
}
