//! In-memory mock implementations for the billing repository traits and
//! the payment provider port.

use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::{
        PaymentProviderPort, ProviderCheckoutSession, ProviderCustomer, ProviderPortalSession,
        ProviderSubscription,
    },
    application::use_cases::subscriptions::{
        ResourceCountRepo, SubscriptionPatch, SubscriptionRepo,
    },
    domain::entities::{
        plan::ResourceType,
        subscription::{PlanType, Subscription, SubscriptionStatus},
    },
};

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub records: Mutex<HashMap<String, Subscription>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn get_active_subscription(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        let records = self.records.lock().unwrap();
        let mut active: Vec<&Subscription> = records
            .values()
            .filter(|s| s.user_id == user_id && s.status == SubscriptionStatus::Active)
            .collect();
        active.sort_by_key(|s| s.created_at);
        Ok(active.first().cloned().cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        let records = self.records.lock().unwrap();
        let mut all: Vec<Subscription> = records
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        all.sort_by_key(|s| s.created_at);
        Ok(all)
    }

    async fn upsert(
        &self,
        user_id: Uuid,
        id: &str,
        patch: &SubscriptionPatch,
    ) -> AppResult<Subscription> {
        let mut records = self.records.lock().unwrap();
        let now = chrono::Utc::now().naive_utc();

        let record = match records.get(id) {
            Some(existing) => {
                // Clock granularity can make back-to-back upserts share a
                // timestamp; keep updated_at strictly increasing like the
                // database trigger does.
                let updated_at = if now > existing.updated_at {
                    now
                } else {
                    existing.updated_at + Duration::microseconds(1)
                };
                Subscription {
                    id: existing.id.clone(),
                    user_id: existing.user_id,
                    plan_type: patch.plan_type.unwrap_or(existing.plan_type),
                    status: patch.status.unwrap_or(existing.status),
                    stripe_customer_id: patch
                        .stripe_customer_id
                        .clone()
                        .or_else(|| existing.stripe_customer_id.clone()),
                    stripe_subscription_id: patch
                        .stripe_subscription_id
                        .clone()
                        .or_else(|| existing.stripe_subscription_id.clone()),
                    current_period_start: patch
                        .current_period_start
                        .or(existing.current_period_start),
                    current_period_end: patch.current_period_end.or(existing.current_period_end),
                    cancel_at_period_end: patch
                        .cancel_at_period_end
                        .unwrap_or(existing.cancel_at_period_end),
                    created_at: existing.created_at,
                    updated_at,
                }
            }
            None => Subscription {
                id: id.to_string(),
                user_id,
                plan_type: patch.plan_type.unwrap_or(PlanType::Free),
                status: patch.status.unwrap_or(SubscriptionStatus::Pending),
                stripe_customer_id: patch.stripe_customer_id.clone(),
                stripe_subscription_id: patch.stripe_subscription_id.clone(),
                current_period_start: patch.current_period_start,
                current_period_end: patch.current_period_end,
                cancel_at_period_end: patch.cancel_at_period_end.unwrap_or(false),
                created_at: now,
                updated_at: now,
            },
        };

        records.insert(id.to_string(), record.clone());
        Ok(record)
    }

    async fn find_user_ids_by_customer_id(&self, customer_id: &str) -> AppResult<Vec<Uuid>> {
        let records = self.records.lock().unwrap();
        let mut user_ids: Vec<Uuid> = records
            .values()
            .filter(|s| s.stripe_customer_id.as_deref() == Some(customer_id))
            .map(|s| s.user_id)
            .collect();
        user_ids.sort();
        user_ids.dedup();
        Ok(user_ids)
    }
}

// ============================================================================
// InMemoryResourceCounts
// ============================================================================

#[derive(Default)]
pub struct InMemoryResourceCounts {
    pub counts: Mutex<HashMap<(Uuid, ResourceType), i64>>,
}

impl InMemoryResourceCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: Uuid, resource: ResourceType, count: i64) {
        self.counts
            .lock()
            .unwrap()
            .insert((user_id, resource), count);
    }
}

#[async_trait]
impl ResourceCountRepo for InMemoryResourceCounts {
    async fn count_for_user(&self, user_id: Uuid, resource: ResourceType) -> AppResult<i64> {
        Ok(self
            .counts
            .lock()
            .unwrap()
            .get(&(user_id, resource))
            .copied()
            .unwrap_or(0))
    }
}

// ============================================================================
// MockPaymentProvider
// ============================================================================

/// Arguments a checkout session was opened with, kept for assertions.
#[derive(Debug, Clone)]
pub struct RecordedCheckoutSession {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Scripted stand-in for the Stripe client. Subscriptions registered with
/// `add_subscription` are served by id; `fail_next_get_subscription` makes
/// the next fetch return a provider error. Checkout and portal session
/// requests are recorded for inspection.
#[derive(Default)]
pub struct MockPaymentProvider {
    pub subscriptions: Mutex<HashMap<String, ProviderSubscription>>,
    pub customers: Mutex<HashMap<String, ProviderCustomer>>,
    pub checkout_sessions: Mutex<Vec<RecordedCheckoutSession>>,
    pub portal_return_urls: Mutex<Vec<String>>,
    fail_next_get: AtomicBool,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subscription(&self, subscription: ProviderSubscription) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id.clone(), subscription);
    }

    pub fn fail_next_get_subscription(&self) {
        self.fail_next_get.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentProviderPort for MockPaymentProvider {
    async fn get_subscription(&self, subscription_id: &str) -> AppResult<ProviderSubscription> {
        if self.fail_next_get.swap(false, Ordering::SeqCst) {
            return Err(AppError::PaymentProvider("scripted failure".into()));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| {
                AppError::PaymentProvider(format!("no such subscription: {}", subscription_id))
            })
    }

    async fn get_or_create_customer(
        &self,
        email: &str,
        _user_id: &str,
    ) -> AppResult<ProviderCustomer> {
        let mut customers = self.customers.lock().unwrap();
        if let Some(existing) = customers.values().find(|c| c.email.as_deref() == Some(email)) {
            return Ok(existing.clone());
        }
        let customer = ProviderCustomer {
            id: format!("cus_test_{}", customers.len() + 1),
            email: Some(email.to_string()),
        };
        customers.insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> AppResult<ProviderCheckoutSession> {
        self.checkout_sessions
            .lock()
            .unwrap()
            .push(RecordedCheckoutSession {
                customer_id: customer_id.to_string(),
                price_id: price_id.to_string(),
                success_url: success_url.to_string(),
                cancel_url: cancel_url.to_string(),
            });
        Ok(ProviderCheckoutSession {
            id: "cs_test_1".to_string(),
            url: Some(format!(
                "https://checkout.stripe.test/pay/{}",
                customer_id
            )),
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AppResult<ProviderPortalSession> {
        self.portal_return_urls
            .lock()
            .unwrap()
            .push(return_url.to_string());
        Ok(ProviderPortalSession {
            id: "bps_test_1".to_string(),
            url: format!("https://billing.stripe.test/session/{}", customer_id),
        })
    }
}
