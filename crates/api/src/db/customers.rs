//! Customer interest tracking.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use marketstall_core::{CustomerId, InterestStatus, ProductId, UserId};

use super::RepositoryError;
use crate::models::{Customer, CustomerInterest};

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: CustomerId,
    vendor_id: UserId,
    phone: String,
    name: String,
    last_interaction: DateTime<Utc>,
    total_purchases: i32,
    is_active: bool,
}

impl CustomerRow {
    fn into_customer(self, interests: Vec<CustomerInterest>) -> Customer {
        Customer {
            id: self.id,
            vendor_id: self.vendor_id,
            phone: self.phone,
            name: self.name,
            last_interaction: self.last_interaction,
            total_purchases: self.total_purchases,
            is_active: self.is_active,
            interests,
        }
    }
}

/// Repository for customer and interest records.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record that `phone` is interested in a vendor's product.
    ///
    /// Creates the customer on first contact, resets the interest to
    /// `interested` with a fresh timestamp and bumps `last_interaction`.
    /// A non-empty `name` replaces the stored one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not an active
    /// product of the vendor, `RepositoryError::Database` otherwise.
    pub async fn track_interest(
        &self,
        vendor_id: UserId,
        phone: &str,
        name: Option<&str>,
        product_id: ProductId,
    ) -> Result<CustomerId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM products WHERE id = $1 AND vendor_id = $2 AND is_active)",
        )
        .bind(product_id.as_i32())
        .bind(vendor_id.as_i32())
        .fetch_one(&mut *tx)
        .await?;

        if !exists {
            return Err(RepositoryError::NotFound);
        }

        let customer_id: CustomerId = sqlx::query_scalar(
            "INSERT INTO customers (vendor_id, phone, name) VALUES ($1, $2, COALESCE($3, '')) \
             ON CONFLICT (vendor_id, phone) DO UPDATE \
             SET last_interaction = NOW(), \
                 name = COALESCE(NULLIF($3, ''), customers.name) \
             RETURNING id",
        )
        .bind(vendor_id.as_i32())
        .bind(phone)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO customer_interests (customer_id, product_id, status) VALUES ($1, $2, $3) \
             ON CONFLICT (customer_id, product_id) DO UPDATE \
             SET status = EXCLUDED.status, updated_at = NOW()",
        )
        .bind(customer_id.as_i32())
        .bind(product_id.as_i32())
        .bind(InterestStatus::Interested)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(customer_id)
    }

    /// Customers seen since `since` with at least one open interest.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn follow_up(
        &self,
        vendor_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            "SELECT c.id, c.vendor_id, c.phone, c.name, c.last_interaction, c.total_purchases, \
                    c.is_active \
             FROM customers c \
             WHERE c.vendor_id = $1 AND c.last_interaction >= $2 \
               AND EXISTS (SELECT 1 FROM customer_interests i \
                           WHERE i.customer_id = c.id AND i.status = $3) \
             ORDER BY c.last_interaction DESC",
        )
        .bind(vendor_id.as_i32())
        .bind(since)
        .bind(InterestStatus::Interested)
        .fetch_all(self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let interests = sqlx::query_as::<_, CustomerInterest>(
            "SELECT i.customer_id, i.product_id, p.name AS product_name, i.status, i.updated_at \
             FROM customer_interests i JOIN products p ON p.id = i.product_id \
             WHERE i.customer_id = ANY($1) \
             ORDER BY i.updated_at DESC",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut grouped: HashMap<CustomerId, Vec<CustomerInterest>> = HashMap::new();
        for interest in interests {
            grouped.entry(interest.customer_id).or_default().push(interest);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let interests = grouped.remove(&row.id).unwrap_or_default();
                row.into_customer(interests)
            })
            .collect())
    }
}
