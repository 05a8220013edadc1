//! Buyer activity log.

use sqlx::PgPool;

use marketstall_core::{InteractionAction, ProductId, UserId};

use super::RepositoryError;
use crate::models::BuyerInteraction;

/// Repository for `buyer_interactions`.
pub struct InteractionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InteractionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an interaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the vendor is not an active
    /// vendor account, `RepositoryError::Database` otherwise.
    pub async fn record(
        &self,
        buyer_id: UserId,
        vendor_id: UserId,
        product_id: Option<ProductId>,
        action: InteractionAction,
    ) -> Result<BuyerInteraction, RepositoryError> {
        let interaction = sqlx::query_as::<_, BuyerInteraction>(
            "INSERT INTO buyer_interactions (buyer_id, vendor_id, product_id, action) \
             SELECT $1, u.id, $3, $4 FROM users u \
             WHERE u.id = $2 AND u.role = 'vendor' AND u.is_active \
             RETURNING id, buyer_id, vendor_id, product_id, action, created_at",
        )
        .bind(buyer_id.as_i32())
        .bind(vendor_id.as_i32())
        .bind(product_id.map(|id| id.as_i32()))
        .bind(action)
        .fetch_optional(self.pool)
        .await?;

        interaction.ok_or(RepositoryError::NotFound)
    }

    /// A buyer's most recent interactions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_buyer(
        &self,
        buyer_id: UserId,
        limit: i64,
    ) -> Result<Vec<BuyerInteraction>, RepositoryError> {
        let interactions = sqlx::query_as::<_, BuyerInteraction>(
            "SELECT id, buyer_id, vendor_id, product_id, action, created_at \
             FROM buyer_interactions WHERE buyer_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(buyer_id.as_i32())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(interactions)
    }
}
