//! Postgres implementation of GatewayDirectory.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::Gateway;
use crate::ports::{DirectoryError, GatewayDirectory};

#[derive(Clone)]
pub struct PostgresGatewayDirectory {
    pool: PgPool,
}

impl PostgresGatewayDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GatewayDirectory for PostgresGatewayDirectory {
    async fn gateways_for_country(&self, country_id: i32) -> Result<Vec<Gateway>, DirectoryError> {
        let rows = sqlx::query_as::<_, (i32, String, String, i32, i32)>(
            r#"
            SELECT g.id, g.name, g.data_format_supported, g.priority, gc.country_id
            FROM gateways g
            INNER JOIN gateway_countries gc ON g.id = gc.gateway_id
            WHERE gc.country_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(country_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, data_format_supported, priority, country_id)| Gateway {
                id,
                name,
                data_format_supported,
                priority,
                country_id,
            })
            .collect())
    }
}
