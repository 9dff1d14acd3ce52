//! Test app state builder for HTTP-level integration testing.
//!
//! Builds a minimal `AppState` over the in-memory mocks so route handlers
//! can be exercised through `axum_test::TestServer`.

use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{billing_events::WebhookUseCases, subscriptions::SubscriptionUseCases},
    infra::config::{AppConfig, BillingConfig},
    test_utils::{InMemoryResourceCounts, InMemorySubscriptionRepo, MockPaymentProvider},
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const TEST_PRO_PRICE_ID: &str = "price_pro_test";
pub const TEST_BASIC_PRICE_ID: &str = "price_basic_test";

/// Built test state plus handles on the mocks behind it.
pub struct TestApp {
    pub state: AppState,
    pub subscriptions: Arc<SubscriptionUseCases>,
    pub resource_counts: Arc<InMemoryResourceCounts>,
    pub provider: Arc<MockPaymentProvider>,
}

pub struct TestAppBuilder {
    webhook_secret: String,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
        }
    }

    pub fn with_webhook_secret(mut self, secret: &str) -> Self {
        self.webhook_secret = secret.to_string();
        self
    }

    pub fn build(self) -> TestApp {
        let repo = Arc::new(InMemorySubscriptionRepo::new());
        let resource_counts = Arc::new(InMemoryResourceCounts::new());
        let subscriptions = Arc::new(SubscriptionUseCases::new(
            repo,
            resource_counts.clone(),
        ));
        let provider = Arc::new(MockPaymentProvider::new());
        let webhooks = Arc::new(WebhookUseCases::new(
            subscriptions.clone(),
            provider.clone(),
            TEST_PRO_PRICE_ID.to_string(),
        ));

        let config = Arc::new(AppConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            app_origin: Url::parse("http://localhost:3000").unwrap(),
            billing: BillingConfig {
                stripe_secret_key: SecretString::from("sk_test_key".to_string()),
                stripe_webhook_secret: SecretString::from(self.webhook_secret),
                stripe_pro_price_id: TEST_PRO_PRICE_ID.to_string(),
                stripe_basic_price_id: TEST_BASIC_PRICE_ID.to_string(),
            },
        });

        let state = AppState {
            config,
            subscription_use_cases: subscriptions.clone(),
            webhook_use_cases: webhooks,
            payment_provider: provider.clone(),
        };

        TestApp {
            state,
            subscriptions,
            resource_counts,
            provider,
        }
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
