//! Product repository.
//!
//! Products are never hard-deleted; `soft_delete_owned` clears `is_active` so
//! historical order items keep their reference.

use sqlx::{PgPool, Postgres, QueryBuilder};

use marketstall_core::{ProductId, UserId};

use super::{RepositoryError, contains_pattern};
use crate::models::{Product, ProductFilter, ProductInput, ProductWithVendor, VendorSummary};

macro_rules! product_columns {
    () => {
        "p.id, p.vendor_id, p.name, p.price, p.currency, p.description, p.image_url, \
         p.category, p.payment_link, p.is_active, p.featured, p.views, p.stock, \
         p.created_at, p.updated_at"
    };
}

macro_rules! vendor_join_columns {
    () => {
        "u.name AS vendor_name, u.business_name AS vendor_business_name, \
         u.phone AS vendor_phone, u.logo_url AS vendor_logo_url, u.about AS vendor_about, \
         u.catalog_id AS vendor_catalog_id"
    };
}

/// Internal row type for product + vendor joins.
#[derive(Debug, sqlx::FromRow)]
struct ProductVendorRow {
    #[sqlx(flatten)]
    product: Product,
    vendor_name: String,
    vendor_business_name: Option<String>,
    vendor_phone: Option<String>,
    vendor_logo_url: Option<String>,
    vendor_about: String,
    vendor_catalog_id: Option<String>,
}

impl TryFrom<ProductVendorRow> for ProductWithVendor {
    type Error = RepositoryError;

    fn try_from(row: ProductVendorRow) -> Result<Self, Self::Error> {
        let missing = || {
            RepositoryError::DataCorruption(format!(
                "product {} belongs to a vendor without a business profile",
                row.product.id
            ))
        };
        let business_name = row.vendor_business_name.clone().ok_or_else(missing)?;
        let catalog_id = row.vendor_catalog_id.clone().ok_or_else(missing)?;

        Ok(Self {
            vendor: VendorSummary {
                id: row.product.vendor_id,
                name: row.vendor_name,
                business_name,
                phone: row.vendor_phone,
                logo_url: row.vendor_logo_url,
                about: row.vendor_about,
                catalog_id,
            },
            product: row.product,
        })
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A vendor's active products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active_for_vendor(
        &self,
        vendor_id: UserId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products p \
             WHERE p.vendor_id = $1 AND p.is_active \
             ORDER BY p.created_at DESC, p.id DESC"
        ))
        .bind(vendor_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// An active product, only if `vendor_id` owns it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_owned(
        &self,
        id: ProductId,
        vendor_id: UserId,
    ) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products p WHERE p.id = $1 AND p.vendor_id = $2 AND p.is_active"
        ))
        .bind(id.as_i32())
        .bind(vendor_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Create a product for a vendor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        vendor_id: UserId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(concat!(
            "INSERT INTO products AS p (vendor_id, name, price, description, image_url, category, \
             stock, featured, payment_link) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING ",
            product_columns!()
        ))
        .bind(vendor_id.as_i32())
        .bind(&input.name)
        .bind(input.price)
        .bind(&input.description)
        .bind(input.image_url.as_deref())
        .bind(&input.category)
        .bind(input.stock)
        .bind(input.featured)
        .bind(input.payment_link.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(product)
    }

    /// Update a product the vendor owns. Returns `None` when not owned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_owned(
        &self,
        id: ProductId,
        vendor_id: UserId,
        input: &ProductInput,
    ) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(concat!(
            "UPDATE products AS p SET name = $3, price = $4, description = $5, image_url = $6, \
             category = $7, stock = $8, featured = $9, payment_link = $10 \
             WHERE p.id = $1 AND p.vendor_id = $2 AND p.is_active \
             RETURNING ",
            product_columns!()
        ))
        .bind(id.as_i32())
        .bind(vendor_id.as_i32())
        .bind(&input.name)
        .bind(input.price)
        .bind(&input.description)
        .bind(input.image_url.as_deref())
        .bind(&input.category)
        .bind(input.stock)
        .bind(input.featured)
        .bind(input.payment_link.as_deref())
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Soft-delete a product the vendor owns. Returns `false` when not owned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn soft_delete_owned(
        &self,
        id: ProductId,
        vendor_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET is_active = FALSE WHERE id = $1 AND vendor_id = $2 AND is_active",
        )
        .bind(id.as_i32())
        .bind(vendor_id.as_i32())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// How many of `ids` are active products owned by the vendor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_owned(
        &self,
        vendor_id: UserId,
        ids: &[ProductId],
    ) -> Result<i64, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE vendor_id = $1 AND is_active AND id = ANY($2)",
        )
        .bind(vendor_id.as_i32())
        .bind(&raw)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Active products for buyers, filtered and sorted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn browse(
        &self,
        filter: &ProductFilter,
        limit: i64,
    ) -> Result<Vec<ProductWithVendor>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(concat!(
            "SELECT ",
            product_columns!(),
            ", ",
            vendor_join_columns!(),
            " FROM products p JOIN users u ON u.id = p.vendor_id \
             WHERE p.is_active AND u.is_active"
        ));

        if let Some(category) = &filter.category {
            qb.push(" AND p.category = ").push_bind(category.clone());
        }
        if let Some(search) = &filter.search {
            qb.push(" AND p.name ILIKE ").push_bind(contains_pattern(search));
        }
        if let Some(min) = filter.min_price {
            qb.push(" AND p.price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND p.price <= ").push_bind(max);
        }

        qb.push(" ORDER BY ").push(filter.sort.order_by());
        qb.push(" LIMIT ").push_bind(limit);

        let rows = qb
            .build_query_as::<ProductVendorRow>()
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Active featured products, most viewed first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn featured(&self, limit: i64) -> Result<Vec<ProductWithVendor>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductVendorRow>(concat!(
            "SELECT ",
            product_columns!(),
            ", ",
            vendor_join_columns!(),
            " FROM products p JOIN users u ON u.id = p.vendor_id \
             WHERE p.is_active AND p.featured AND u.is_active \
             ORDER BY p.views DESC, p.id DESC \
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Fetch an active product for display, counting the view.
    ///
    /// The increment is a single `UPDATE`, so concurrent views are never lost.
    /// Inactive products are not counted and yield `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_view(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductWithVendor>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductVendorRow>(concat!(
            "WITH p AS (\
                UPDATE products SET views = views + 1 \
                WHERE id = $1 AND is_active \
                RETURNING *\
             ) SELECT ",
            product_columns!(),
            ", ",
            vendor_join_columns!(),
            " FROM p JOIN users u ON u.id = p.vendor_id"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Total views across a vendor's active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn total_views(&self, vendor_id: UserId) -> Result<i64, RepositoryError> {
        let views: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(views), 0)::BIGINT FROM products WHERE vendor_id = $1 AND is_active",
        )
        .bind(vendor_id.as_i32())
        .fetch_one(self.pool)
        .await?;

        Ok(views)
    }

    /// The vendor selling an active product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn vendor_of(&self, id: ProductId) -> Result<Option<UserId>, RepositoryError> {
        let vendor_id: Option<UserId> =
            sqlx::query_scalar("SELECT vendor_id FROM products WHERE id = $1 AND is_active")
                .bind(id.as_i32())
                .fetch_optional(self.pool)
                .await?;

        Ok(vendor_id)
    }

    /// Number of a vendor's active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active(&self, vendor_id: UserId) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE vendor_id = $1 AND is_active")
                .bind(vendor_id.as_i32())
                .fetch_one(self.pool)
                .await?;

        Ok(count)
    }
}
