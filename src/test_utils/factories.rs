//! Test data factories and webhook helpers.
//!
//! Factories create complete, valid objects with sensible defaults; use the
//! closure parameter to override specific fields.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::application::ports::payment_provider::{
    ProviderPrice, ProviderSubscription, ProviderSubscriptionItem, ProviderSubscriptionItems,
};

/// Create a provider-side subscription with sensible defaults.
pub fn create_provider_subscription(
    id: &str,
    customer: &str,
    overrides: impl FnOnce(&mut ProviderSubscription),
) -> ProviderSubscription {
    let mut subscription = ProviderSubscription {
        id: id.to_string(),
        customer: customer.to_string(),
        status: "active".to_string(),
        current_period_start: 1_700_000_000,
        current_period_end: 1_702_592_000,
        cancel_at_period_end: false,
        items: ProviderSubscriptionItems {
            data: vec![ProviderSubscriptionItem {
                price: ProviderPrice {
                    id: "price_basic_default".to_string(),
                },
            }],
        },
    };
    overrides(&mut subscription);
    subscription
}

/// Build a valid `stripe-signature` header for a payload, timestamped now.
pub fn sign_webhook_payload(payload: &str, secret: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let signed_payload = format!("{}.{}", timestamp, payload);
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signed_payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={},v1={}", timestamp, signature)
}
