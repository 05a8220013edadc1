//! Auto-post settings, one row per vendor.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use marketstall_core::{AutoPostId, PostFrequency, ProductId, UserId};

use super::RepositoryError;
use crate::models::{AutoPost, AutoPostInput};

macro_rules! auto_post_columns {
    () => {
        "id, vendor_id, is_enabled, post_time, post_frequency, selected_product_ids, \
         last_posted_at, created_at, updated_at"
    };
}

#[derive(Debug, sqlx::FromRow)]
struct AutoPostRow {
    id: AutoPostId,
    vendor_id: UserId,
    is_enabled: bool,
    post_time: String,
    post_frequency: PostFrequency,
    selected_product_ids: Vec<i32>,
    last_posted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AutoPostRow> for AutoPost {
    fn from(row: AutoPostRow) -> Self {
        Self {
            id: row.id,
            vendor_id: row.vendor_id,
            is_enabled: row.is_enabled,
            post_time: row.post_time,
            post_frequency: row.post_frequency,
            selected_products: row
                .selected_product_ids
                .into_iter()
                .map(ProductId::new)
                .collect(),
            last_posted_at: row.last_posted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for `auto_posts`.
pub struct AutoPostRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AutoPostRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The vendor's settings, if ever saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, vendor_id: UserId) -> Result<Option<AutoPost>, RepositoryError> {
        let row = sqlx::query_as::<_, AutoPostRow>(concat!(
            "SELECT ",
            auto_post_columns!(),
            " FROM auto_posts WHERE vendor_id = $1"
        ))
        .bind(vendor_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create or replace the vendor's settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        vendor_id: UserId,
        input: &AutoPostInput,
    ) -> Result<AutoPost, RepositoryError> {
        let selected: Vec<i32> = input
            .selected_products
            .iter()
            .map(ProductId::as_i32)
            .collect();

        let row = sqlx::query_as::<_, AutoPostRow>(concat!(
            "INSERT INTO auto_posts (vendor_id, is_enabled, post_time, post_frequency, \
             selected_product_ids) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (vendor_id) DO UPDATE \
             SET is_enabled = EXCLUDED.is_enabled, post_time = EXCLUDED.post_time, \
                 post_frequency = EXCLUDED.post_frequency, \
                 selected_product_ids = EXCLUDED.selected_product_ids \
             RETURNING ",
            auto_post_columns!()
        ))
        .bind(vendor_id.as_i32())
        .bind(input.is_enabled)
        .bind(&input.post_time)
        .bind(input.post_frequency)
        .bind(&selected)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}
