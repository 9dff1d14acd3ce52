//! Subscription store: per-user subscription records with merge-upsert
//! semantics, the idempotent free-tier guard, and plan-limit checks.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::{
        plan::{plan_definition, PlanLimit, ResourceType},
        subscription::{free_subscription_id, PlanType, Subscription, SubscriptionStatus},
    },
};

/// Field-level merge input for the upsert primitive. `None` leaves the
/// stored column untouched; the storage layer applies the merge as a
/// single atomic statement.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    pub plan_type: Option<PlanType>,
    pub status: Option<SubscriptionStatus>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub current_period_start: Option<NaiveDateTime>,
    pub current_period_end: Option<NaiveDateTime>,
    pub cancel_at_period_end: Option<bool>,
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// First record with status `active` for the user, if any. The store
    /// does not enforce single-active-record uniqueness.
    async fn get_active_subscription(&self, user_id: Uuid) -> AppResult<Option<Subscription>>;

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Subscription>>;

    /// Atomic merge upsert keyed by subscription id: create with
    /// `created_at`/`updated_at` set, or merge fields and bump `updated_at`.
    async fn upsert(
        &self,
        user_id: Uuid,
        id: &str,
        patch: &SubscriptionPatch,
    ) -> AppResult<Subscription>;

    /// Indexed secondary lookup: distinct users owning a record with this
    /// processor customer id. More than one match is tolerated.
    async fn find_user_ids_by_customer_id(&self, customer_id: &str) -> AppResult<Vec<Uuid>>;
}

/// Counts a user's current resources for plan-limit checks.
#[async_trait]
pub trait ResourceCountRepo: Send + Sync {
    async fn count_for_user(&self, user_id: Uuid, resource: ResourceType) -> AppResult<i64>;
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    repo: Arc<dyn SubscriptionRepo>,
    resource_counts: Arc<dyn ResourceCountRepo>,
}

impl SubscriptionUseCases {
    pub fn new(repo: Arc<dyn SubscriptionRepo>, resource_counts: Arc<dyn ResourceCountRepo>) -> Self {
        Self {
            repo,
            resource_counts,
        }
    }

    pub async fn get_active_subscription(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        self.repo.get_active_subscription(user_id).await
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        self.repo.list_for_user(user_id).await
    }

    /// Idempotent upsert backing every webhook write path.
    pub async fn set_subscription(
        &self,
        user_id: Uuid,
        subscription_id: &str,
        patch: &SubscriptionPatch,
    ) -> AppResult<Subscription> {
        self.repo.upsert(user_id, subscription_id, patch).await
    }

    pub async fn find_user_ids_by_customer_id(&self, customer_id: &str) -> AppResult<Vec<Uuid>> {
        self.repo.find_user_ids_by_customer_id(customer_id).await
    }

    /// Ensure the user has an active free-tier record.
    ///
    /// Guard: an existing active free record is returned unchanged. An
    /// existing active paid record is logged and left alone, and a free
    /// record is still created alongside it (rare dual-active edge; the
    /// paid record stays authoritative until the processor cancels it).
    pub async fn create_free_subscription(&self, user_id: Uuid) -> AppResult<String> {
        if let Some(existing) = self.repo.get_active_subscription(user_id).await? {
            if existing.plan_type == PlanType::Free {
                return Ok(existing.id);
            }
            tracing::warn!(
                user_id = %user_id,
                existing_id = %existing.id,
                "active paid subscription present while creating free record"
            );
        }

        let id = free_subscription_id();
        let patch = SubscriptionPatch {
            plan_type: Some(PlanType::Free),
            status: Some(SubscriptionStatus::Active),
            cancel_at_period_end: Some(false),
            ..Default::default()
        };
        self.repo.upsert(user_id, &id, &patch).await?;
        Ok(id)
    }

    /// Whether the user may create one more resource of this type under
    /// their active plan. Users with no active record get free-tier limits.
    pub async fn check_plan_limits(
        &self,
        user_id: Uuid,
        resource: ResourceType,
    ) -> AppResult<bool> {
        let plan_type = self
            .repo
            .get_active_subscription(user_id)
            .await?
            .map(|s| s.plan_type)
            .unwrap_or(PlanType::Free);

        let limit = plan_definition(plan_type).limits.for_resource(resource);
        if limit == PlanLimit::Unlimited {
            return Ok(true);
        }

        let count = self
            .resource_counts
            .count_for_user(user_id, resource)
            .await?;
        Ok(limit.allows(count))
    }
}
