//! Billing routes: plans, subscription, free-tier creation, checkout,
//! portal, and plan-limit checks.
//!
//! User identity comes from the `x-user-id` header set by the identity
//! proxy in front of this service.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::subscriptions::SubscriptionPatch,
    domain::entities::plan::{PlanDefinition, ResourceType, plan_catalog, plan_definition},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(get_plans))
        .route("/subscription", get(get_subscription))
        .route("/subscription/free", post(create_free_subscription))
        .route("/checkout", post(create_checkout))
        .route("/portal", post(create_portal))
        .route("/limits/{resource}", get(check_limit))
}

fn current_user(headers: &HeaderMap) -> AppResult<Uuid> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(AppError::Unauthenticated)
}

/// Caller-supplied redirect URL, or one derived from the configured
/// frontend origin.
fn redirect_url(override_url: Option<String>, base: &url::Url, path: &str) -> AppResult<String> {
    match override_url {
        Some(url) => Ok(url),
        None => base
            .join(path)
            .map(|u| u.to_string())
            .map_err(|e| AppError::Internal(format!("invalid redirect URL: {}", e))),
    }
}

// ============================================================================
// Types
// ============================================================================

#[derive(Serialize)]
struct PlanResponse {
    code: &'static str,
    name: &'static str,
    price_cents: i32,
    currency: &'static str,
    features: &'static [&'static str],
}

impl From<&'static PlanDefinition> for PlanResponse {
    fn from(plan: &'static PlanDefinition) -> Self {
        Self {
            code: plan.plan_type.as_str(),
            name: plan.name,
            price_cents: plan.price_cents,
            currency: plan.currency,
            features: plan.features,
        }
    }
}

#[derive(Serialize)]
struct SubscriptionResponse {
    id: Option<String>,
    plan_code: Option<String>,
    plan_name: Option<String>,
    status: String,
    current_period_end: Option<i64>,
    cancel_at_period_end: Option<bool>,
}

#[derive(Serialize)]
struct CreateFreeResponse {
    id: String,
}

#[derive(Deserialize)]
struct CreateCheckoutPayload {
    plan_code: String,
    email: String,
    /// Defaults to `{app_origin}/billing/success` when omitted.
    success_url: Option<String>,
    /// Defaults to `{app_origin}/billing/cancel` when omitted.
    cancel_url: Option<String>,
}

#[derive(Serialize)]
struct CheckoutResponse {
    checkout_url: String,
}

#[derive(Deserialize)]
struct CreatePortalPayload {
    /// Defaults to `{app_origin}/billing` when omitted.
    return_url: Option<String>,
}

#[derive(Serialize)]
struct PortalResponse {
    portal_url: String,
}

#[derive(Serialize)]
struct LimitResponse {
    allowed: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/billing/plans
async fn get_plans() -> impl IntoResponse {
    let response: Vec<PlanResponse> = plan_catalog().iter().map(PlanResponse::from).collect();
    Json(response)
}

/// GET /api/billing/subscription
async fn get_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;

    let sub = app_state
        .subscription_use_cases
        .get_active_subscription(user_id)
        .await?;

    match sub {
        Some(subscription) => {
            let plan = plan_definition(subscription.plan_type);
            Ok(Json(SubscriptionResponse {
                id: Some(subscription.id),
                plan_code: Some(plan.plan_type.as_str().to_string()),
                plan_name: Some(plan.name.to_string()),
                status: subscription.status.as_str().to_string(),
                current_period_end: subscription
                    .current_period_end
                    .map(|dt| dt.and_utc().timestamp()),
                cancel_at_period_end: Some(subscription.cancel_at_period_end),
            }))
        }
        None => Ok(Json(SubscriptionResponse {
            id: None,
            plan_code: None,
            plan_name: None,
            status: "none".to_string(),
            current_period_end: None,
            cancel_at_period_end: None,
        })),
    }
}

/// POST /api/billing/subscription/free
/// Registration hook: makes sure the user starts on the free tier.
async fn create_free_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;

    let id = app_state
        .subscription_use_cases
        .create_free_subscription(user_id)
        .await?;

    Ok(Json(CreateFreeResponse { id }))
}

/// POST /api/billing/checkout
///
/// Brokers a Stripe checkout session. The customer id is stamped onto the
/// user's active record before redirecting, so the webhook that follows
/// the payment can resolve the user by customer id.
async fn create_checkout(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateCheckoutPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;

    let price_id = match payload.plan_code.as_str() {
        "basic" => &app_state.config.billing.stripe_basic_price_id,
        "pro" => &app_state.config.billing.stripe_pro_price_id,
        other => {
            return Err(AppError::InvalidInput(format!(
                "plan `{}` cannot be checked out",
                other
            )));
        }
    };

    let customer = app_state
        .payment_provider
        .get_or_create_customer(&payload.email, &user_id.to_string())
        .await?;

    let record_id = match app_state
        .subscription_use_cases
        .get_active_subscription(user_id)
        .await?
    {
        Some(active) => active.id,
        None => {
            app_state
                .subscription_use_cases
                .create_free_subscription(user_id)
                .await?
        }
    };
    app_state
        .subscription_use_cases
        .set_subscription(
            user_id,
            &record_id,
            &SubscriptionPatch {
                stripe_customer_id: Some(customer.id.clone()),
                ..Default::default()
            },
        )
        .await?;

    let success_url = redirect_url(
        payload.success_url,
        &app_state.config.app_origin,
        "billing/success",
    )?;
    let cancel_url = redirect_url(
        payload.cancel_url,
        &app_state.config.app_origin,
        "billing/cancel",
    )?;

    let session = app_state
        .payment_provider
        .create_checkout_session(&customer.id, price_id, &success_url, &cancel_url)
        .await?;

    let checkout_url = session.url.ok_or(AppError::Internal(
        "Stripe checkout session missing URL".into(),
    ))?;

    Ok(Json(CheckoutResponse { checkout_url }))
}

/// POST /api/billing/portal
async fn create_portal(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePortalPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;

    let customer_id = app_state
        .subscription_use_cases
        .get_active_subscription(user_id)
        .await?
        .and_then(|s| s.stripe_customer_id)
        .ok_or(AppError::InvalidInput(
            "No billing account on file".into(),
        ))?;

    let return_url = redirect_url(payload.return_url, &app_state.config.app_origin, "billing")?;

    let portal = app_state
        .payment_provider
        .create_portal_session(&customer_id, &return_url)
        .await?;

    Ok(Json(PortalResponse {
        portal_url: portal.url,
    }))
}

/// GET /api/billing/limits/{resource}
async fn check_limit(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(resource): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;

    let resource = ResourceType::parse(&resource)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown resource `{}`", resource)))?;

    let allowed = app_state
        .subscription_use_cases
        .check_plan_limits(user_id, resource)
        .await?;

    Ok(Json(LimitResponse { allowed }))
}
