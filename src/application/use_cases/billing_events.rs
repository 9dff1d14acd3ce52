//! Webhook event handlers: the sole authoritative writer of subscription
//! state transitions driven by the payment processor.
//!
//! Each handler returns `Result<(), HandlerError>`; the dispatch layer in
//! the webhook route applies the acknowledgement policy (`should_retry`)
//! to decide what, if anything, surfaces to the processor.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    app_error::AppError,
    application::ports::payment_provider::PaymentProviderPort,
    application::use_cases::subscriptions::{SubscriptionPatch, SubscriptionUseCases},
    domain::entities::subscription::{PlanType, SubscriptionStatus},
};

/// Convert a processor epoch-seconds timestamp to the store's native type.
pub fn timestamp_to_naive(secs: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

/// Classify a plan tier from a line-item price id: exact match against the
/// configured pro price id means pro, anything else is basic.
pub fn plan_type_for_price(price_id: &str, pro_price_id: &str) -> PlanType {
    if price_id == pro_price_id {
        PlanType::Pro
    } else {
        PlanType::Basic
    }
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("event is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("no subscription record matches customer {customer_id}")]
    CorrelationMiss { customer_id: String },

    #[error("payment provider call failed: {0}")]
    Provider(AppError),

    #[error("store operation failed: {0}")]
    Store(AppError),
}

/// Acknowledgement policy applied at the dispatch layer.
///
/// Returning `false` means the event is logged and acknowledged so the
/// processor does not redeliver it. Correlation misses are expected races
/// (the webhook can arrive before the initial record exists) and retrying
/// the others would redeliver the whole event to handlers that already
/// partially ran, so every variant is acknowledged today, store failures
/// included.
pub fn should_retry(error: &HandlerError) -> bool {
    match error {
        HandlerError::MissingField(_) => false,
        HandlerError::CorrelationMiss { .. } => false,
        HandlerError::Provider(_) => false,
        HandlerError::Store(_) => false,
    }
}

#[derive(Clone)]
pub struct WebhookUseCases {
    subscriptions: Arc<SubscriptionUseCases>,
    provider: Arc<dyn PaymentProviderPort>,
    pro_price_id: String,
}

impl WebhookUseCases {
    pub fn new(
        subscriptions: Arc<SubscriptionUseCases>,
        provider: Arc<dyn PaymentProviderPort>,
        pro_price_id: String,
    ) -> Self {
        Self {
            subscriptions,
            provider,
            pro_price_id,
        }
    }

    /// Resolve the owning user(s) for a processor customer id. Normally one
    /// match; the store makes no uniqueness guarantee, so all are returned.
    async fn resolve_users(&self, customer_id: &str) -> Result<Vec<Uuid>, HandlerError> {
        let user_ids = self
            .subscriptions
            .find_user_ids_by_customer_id(customer_id)
            .await
            .map_err(HandlerError::Store)?;
        if user_ids.is_empty() {
            return Err(HandlerError::CorrelationMiss {
                customer_id: customer_id.to_string(),
            });
        }
        Ok(user_ids)
    }

    /// `checkout.session.completed`: the first write of a paid record.
    ///
    /// The session payload is not authoritative for period dates, so the
    /// full subscription is re-fetched from the processor.
    pub async fn handle_checkout_completed(
        &self,
        session: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        let customer_id = session["customer"]
            .as_str()
            .ok_or(HandlerError::MissingField("customer"))?;
        let subscription_id = session["subscription"]
            .as_str()
            .ok_or(HandlerError::MissingField("subscription"))?;

        let stripe_sub = self
            .provider
            .get_subscription(subscription_id)
            .await
            .map_err(HandlerError::Provider)?;

        let plan_type = plan_type_for_price(&stripe_sub.price_id(), &self.pro_price_id);
        let patch = SubscriptionPatch {
            plan_type: Some(plan_type),
            status: Some(SubscriptionStatus::from_stripe(&stripe_sub.status)),
            stripe_customer_id: Some(customer_id.to_string()),
            stripe_subscription_id: Some(subscription_id.to_string()),
            current_period_start: timestamp_to_naive(stripe_sub.current_period_start),
            current_period_end: timestamp_to_naive(stripe_sub.current_period_end),
            cancel_at_period_end: Some(stripe_sub.cancel_at_period_end),
        };

        for user_id in self.resolve_users(customer_id).await? {
            self.subscriptions
                .set_subscription(user_id, subscription_id, &patch)
                .await
                .map_err(HandlerError::Store)?;
            tracing::info!(
                user_id = %user_id,
                subscription_id,
                plan = plan_type.as_str(),
                "checkout completed, subscription recorded"
            );
        }
        Ok(())
    }

    /// `customer.subscription.created` / `customer.subscription.updated`:
    /// mirror status, plan, period dates, and the pending-cancellation flag
    /// from the event payload into the record keyed by subscription id.
    /// The upsert creates the record when it does not exist yet, so this
    /// handler and the checkout handler converge on the same record
    /// regardless of delivery order.
    pub async fn handle_subscription_updated(
        &self,
        subscription: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        let subscription_id = subscription["id"]
            .as_str()
            .ok_or(HandlerError::MissingField("id"))?;
        let customer_id = subscription["customer"]
            .as_str()
            .ok_or(HandlerError::MissingField("customer"))?;

        let status = subscription["status"]
            .as_str()
            .map(SubscriptionStatus::from_stripe);
        let plan_type = subscription["items"]["data"]
            .as_array()
            .and_then(|items| items.first())
            .and_then(|item| item["price"]["id"].as_str())
            .map(|price_id| plan_type_for_price(price_id, &self.pro_price_id));

        let patch = SubscriptionPatch {
            plan_type,
            status,
            stripe_customer_id: Some(customer_id.to_string()),
            stripe_subscription_id: Some(subscription_id.to_string()),
            current_period_start: subscription["current_period_start"]
                .as_i64()
                .and_then(timestamp_to_naive),
            current_period_end: subscription["current_period_end"]
                .as_i64()
                .and_then(timestamp_to_naive),
            cancel_at_period_end: subscription["cancel_at_period_end"].as_bool(),
        };

        for user_id in self.resolve_users(customer_id).await? {
            self.subscriptions
                .set_subscription(user_id, subscription_id, &patch)
                .await
                .map_err(HandlerError::Store)?;
        }
        Ok(())
    }

    /// `customer.subscription.deleted`: mark the record canceled (kept as
    /// history) and guarantee the user an active free record. Replays are
    /// idempotent: the free-creation guard returns the existing free
    /// record instead of minting another one.
    pub async fn handle_subscription_deleted(
        &self,
        subscription: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        let subscription_id = subscription["id"]
            .as_str()
            .ok_or(HandlerError::MissingField("id"))?;
        let customer_id = subscription["customer"]
            .as_str()
            .ok_or(HandlerError::MissingField("customer"))?;

        let patch = SubscriptionPatch {
            status: Some(SubscriptionStatus::Canceled),
            cancel_at_period_end: Some(true),
            ..Default::default()
        };

        for user_id in self.resolve_users(customer_id).await? {
            self.subscriptions
                .set_subscription(user_id, subscription_id, &patch)
                .await
                .map_err(HandlerError::Store)?;

            // Downgrade-to-free guarantee: never leave the user without an
            // active record after a processor-side deletion.
            let free_id = self
                .subscriptions
                .create_free_subscription(user_id)
                .await
                .map_err(HandlerError::Store)?;
            tracing::info!(
                user_id = %user_id,
                subscription_id,
                free_id,
                "subscription deleted, user downgraded to free"
            );
        }
        Ok(())
    }

    /// `invoice.paid` (with a subscription reference): refresh status and
    /// period dates from the processor. Plan type and the cancellation
    /// flag are left untouched.
    pub async fn handle_invoice_paid(
        &self,
        invoice: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        let subscription_id = invoice["subscription"]
            .as_str()
            .ok_or(HandlerError::MissingField("subscription"))?;
        let customer_id = invoice["customer"]
            .as_str()
            .ok_or(HandlerError::MissingField("customer"))?;

        let stripe_sub = self
            .provider
            .get_subscription(subscription_id)
            .await
            .map_err(HandlerError::Provider)?;

        let patch = SubscriptionPatch {
            status: Some(SubscriptionStatus::from_stripe(&stripe_sub.status)),
            current_period_start: timestamp_to_naive(stripe_sub.current_period_start),
            current_period_end: timestamp_to_naive(stripe_sub.current_period_end),
            ..Default::default()
        };

        for user_id in self.resolve_users(customer_id).await? {
            self.subscriptions
                .set_subscription(user_id, subscription_id, &patch)
                .await
                .map_err(HandlerError::Store)?;
        }
        Ok(())
    }
}
