use std::sync::Arc;

use crate::{
    application::ports::payment_provider::PaymentProviderPort,
    infra::config::AppConfig,
    use_cases::{billing_events::WebhookUseCases, subscriptions::SubscriptionUseCases},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub webhook_use_cases: Arc<WebhookUseCases>,
    pub payment_provider: Arc<dyn PaymentProviderPort>,
}
