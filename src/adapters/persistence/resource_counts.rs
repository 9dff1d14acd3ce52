use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscriptions::ResourceCountRepo,
    domain::entities::plan::ResourceType,
};

#[async_trait]
impl ResourceCountRepo for PostgresPersistence {
    async fn count_for_user(&self, user_id: Uuid, resource: ResourceType) -> AppResult<i64> {
        let table = match resource {
            ResourceType::Vehicles => "vehicles",
            ResourceType::Clients => "clients",
            ResourceType::Invoices => "invoices",
            ResourceType::Users => "garage_users",
        };
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE user_id = $1",
            table
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(count)
    }
}
