use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub cors_origin: HeaderValue,
    /// Public origin of the Karbill frontend, used as the default base for
    /// checkout/portal redirects.
    pub app_origin: Url,
    pub billing: BillingConfig,
}

/// Billing configuration injected into the webhook processor and the
/// client-facing billing endpoints. All fields are required at startup;
/// a deployment without them fails here rather than per-request.
#[derive(Clone)]
pub struct BillingConfig {
    pub stripe_secret_key: SecretString,
    pub stripe_webhook_secret: SecretString,
    /// Price id that classifies a subscription as the pro tier; any other
    /// price id on a paid subscription is treated as basic.
    pub stripe_pro_price_id: String,
    pub stripe_basic_price_id: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");
        let app_origin: Url = get_env("APP_ORIGIN");

        let stripe_secret_key: SecretString =
            SecretString::new(get_env::<String>("STRIPE_SECRET_KEY").into());
        let stripe_webhook_secret: SecretString =
            SecretString::new(get_env::<String>("STRIPE_WEBHOOK_SECRET").into());
        let stripe_pro_price_id: String = get_env("STRIPE_PRO_PRICE_ID");
        let stripe_basic_price_id: String = get_env("STRIPE_BASIC_PRICE_ID");

        Self {
            bind_addr,
            database_url,
            cors_origin,
            app_origin,
            billing: BillingConfig {
                stripe_secret_key,
                stripe_webhook_secret,
                stripe_pro_price_id,
                stripe_basic_price_id,
            },
        }
    }
}
