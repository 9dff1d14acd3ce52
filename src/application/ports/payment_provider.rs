//! Port for the external payment processor.
//!
//! The webhook handlers re-fetch subscription details through this port
//! (the event payload alone is not authoritative for period dates), and
//! the client-facing endpoints use it to broker checkout and portal
//! sessions. `StripeClient` is the production implementation; tests use
//! the mock in `test_utils`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::app_error::AppResult;

/// Subscription state as reported by the processor.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    pub items: ProviderSubscriptionItems,
}

impl ProviderSubscription {
    /// First line item's price id; plan classification keys off this.
    pub fn price_id(&self) -> String {
        self.items
            .data
            .first()
            .map(|item| item.price.id.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSubscriptionItems {
    pub data: Vec<ProviderSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSubscriptionItem {
    pub price: ProviderPrice,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderPrice {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCustomer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderPortalSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentProviderPort: Send + Sync {
    /// Retrieve authoritative subscription details by processor id.
    async fn get_subscription(&self, subscription_id: &str) -> AppResult<ProviderSubscription>;

    /// Find a customer by email or create one, tagging it with our user id.
    async fn get_or_create_customer(
        &self,
        email: &str,
        user_id: &str,
    ) -> AppResult<ProviderCustomer>;

    /// Open a subscription-mode checkout session for a price.
    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> AppResult<ProviderCheckoutSession>;

    /// Open a billing portal session for subscription self-management.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AppResult<ProviderPortalSession>;
}
