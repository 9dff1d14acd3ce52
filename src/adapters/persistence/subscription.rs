use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscriptions::{SubscriptionPatch, SubscriptionRepo},
    domain::entities::subscription::Subscription,
};

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        id: row.get("id"),
        user_id: row.get("user_id"),
        plan_type: row.get("plan_type"),
        status: row.get("status"),
        stripe_customer_id: row.get("stripe_customer_id"),
        stripe_subscription_id: row.get("stripe_subscription_id"),
        current_period_start: row.get("current_period_start"),
        current_period_end: row.get("current_period_end"),
        cancel_at_period_end: row.get("cancel_at_period_end"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, user_id, plan_type, status, stripe_customer_id, stripe_subscription_id,
    current_period_start, current_period_end, cancel_at_period_end,
    created_at, updated_at
"#;

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_active_subscription(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 AND status = 'active' ORDER BY created_at LIMIT 1",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 ORDER BY created_at",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }

    /// Single-statement merge upsert. `COALESCE` keeps unpatched columns,
    /// so concurrent webhook deliveries cannot interleave a read-modify-write.
    async fn upsert(
        &self,
        user_id: Uuid,
        id: &str,
        patch: &SubscriptionPatch,
    ) -> AppResult<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions
                (id, user_id, plan_type, status, stripe_customer_id, stripe_subscription_id,
                 current_period_start, current_period_end, cancel_at_period_end)
            VALUES ($1, $2,
                    COALESCE($3, 'free'::plan_type),
                    COALESCE($4, 'pending'::subscription_status),
                    $5, $6, $7, $8, COALESCE($9, FALSE))
            ON CONFLICT (id) DO UPDATE SET
                plan_type = COALESCE($3, subscriptions.plan_type),
                status = COALESCE($4, subscriptions.status),
                stripe_customer_id = COALESCE($5, subscriptions.stripe_customer_id),
                stripe_subscription_id = COALESCE($6, subscriptions.stripe_subscription_id),
                current_period_start = COALESCE($7, subscriptions.current_period_start),
                current_period_end = COALESCE($8, subscriptions.current_period_end),
                cancel_at_period_end = COALESCE($9, subscriptions.cancel_at_period_end),
                updated_at = clock_timestamp()
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(user_id)
        .bind(patch.plan_type)
        .bind(patch.status)
        .bind(&patch.stripe_customer_id)
        .bind(&patch.stripe_subscription_id)
        .bind(patch.current_period_start)
        .bind(patch.current_period_end)
        .bind(patch.cancel_at_period_end)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_subscription(&row))
    }

    async fn find_user_ids_by_customer_id(&self, customer_id: &str) -> AppResult<Vec<Uuid>> {
        let user_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM subscriptions WHERE stripe_customer_id = $1",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(user_ids)
    }
}
