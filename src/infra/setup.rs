use std::fs::File;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    application::ports::payment_provider::PaymentProviderPort,
    infra::{config::AppConfig, db::init_db, stripe_client::StripeClient},
    use_cases::{
        billing_events::WebhookUseCases,
        subscriptions::{ResourceCountRepo, SubscriptionRepo, SubscriptionUseCases},
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let pool = init_db(&config.database_url).await?;
    let postgres_arc = Arc::new(PostgresPersistence::new(pool));

    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let resource_counts = postgres_arc as Arc<dyn ResourceCountRepo>;

    let payment_provider: Arc<dyn PaymentProviderPort> = Arc::new(StripeClient::new(
        config.billing.stripe_secret_key.expose_secret().to_string(),
    ));

    let subscription_use_cases = Arc::new(SubscriptionUseCases::new(
        subscription_repo,
        resource_counts,
    ));

    let webhook_use_cases = Arc::new(WebhookUseCases::new(
        subscription_use_cases.clone(),
        payment_provider.clone(),
        config.billing.stripe_pro_price_id.clone(),
    ));

    Ok(AppState {
        config: Arc::new(config),
        subscription_use_cases,
        webhook_use_cases,
        payment_provider,
    })
}

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "karbill_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
