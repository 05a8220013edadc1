//! Order repository.
//!
//! Order placement runs in a single transaction: products are locked, their
//! current name and price are captured into the line items, and tracked
//! stock is decremented with a conditional `UPDATE` so two buyers can never
//! both take the last unit. Products without a stock count are never short.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use marketstall_core::{
    InteractionAction, OrderId, OrderStatus, PaymentStatus, ProductId, UserId,
};

use super::RepositoryError;
use crate::models::{MAX_AMOUNT, NewOrder, Order, OrderItem, TrackedOrder};

macro_rules! order_columns {
    () => {
        "o.id, o.vendor_id, o.buyer_id, o.buyer_name, o.buyer_phone, o.buyer_email, \
         o.delivery_address, o.notes, o.total, o.status, o.payment_status, \
         o.created_at, o.updated_at"
    };
}

/// Errors specific to placing an order.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// The product does not exist, is inactive, or belongs to another vendor.
    #[error("product {0} is not available from this vendor")]
    UnavailableProduct(ProductId),

    /// Not enough units left.
    #[error("insufficient stock for {name}")]
    InsufficientStock { product_id: ProductId, name: String },

    /// The order total does not fit the money column.
    #[error("order total {0} is too large")]
    TotalTooLarge(Decimal),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PlaceOrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Internal row type for order headers.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    vendor_id: UserId,
    buyer_id: Option<UserId>,
    buyer_name: String,
    buyer_phone: String,
    buyer_email: Option<String>,
    delivery_address: String,
    notes: Option<String>,
    total: Decimal,
    status: OrderStatus,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            vendor_id: self.vendor_id,
            buyer_id: self.buyer_id,
            buyer_name: self.buyer_name,
            buyer_phone: self.buyer_phone,
            buyer_email: self.buyer_email,
            delivery_address: self.delivery_address,
            notes: self.notes,
            total: self.total,
            status: self.status,
            payment_status: self.payment_status,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TrackedOrderRow {
    #[sqlx(flatten)]
    order: OrderRow,
    vendor_business_name: Option<String>,
    vendor_phone: Option<String>,
}

/// Product fields captured into an order line.
#[derive(Debug, sqlx::FromRow)]
struct LockedProduct {
    name: String,
    price: Decimal,
    stock: Option<i32>,
}

/// The order columns dashboard figures are derived from.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderFigures {
    pub created_at: DateTime<Utc>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub buyer_phone: String,
}

/// A vendor's order aggregates for the dashboard. Sales exclude cancelled
/// orders; counts include them.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderTotals {
    pub today_sales: Decimal,
    pub week_sales: Decimal,
    pub month_sales: Decimal,
    pub pending_orders: i64,
    pub total_orders: i64,
    pub total_customers: i64,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load line items for a set of orders, grouped by order.
    async fn items_for(
        &self,
        order_ids: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let raw: Vec<i32> = order_ids.iter().map(OrderId::as_i32).collect();
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, name, unit_price, quantity \
             FROM order_items WHERE order_id = ANY($1) ORDER BY id",
        )
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;

        let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let mut items = self.items_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect())
    }

    /// All of a vendor's orders, newest first, optionally capped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_vendor(
        &self,
        vendor_id: UserId,
        limit: Option<i64>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders o WHERE o.vendor_id = $1 \
             ORDER BY o.created_at DESC, o.id DESC \
             LIMIT $2"
        ))
        .bind(vendor_id.as_i32())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        self.attach_items(rows).await
    }

    /// An order, only if it belongs to `vendor_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_owned(
        &self,
        id: OrderId,
        vendor_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders o WHERE o.id = $1 AND o.vendor_id = $2"
        ))
        .bind(id.as_i32())
        .bind(vendor_id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Set the status of an order the vendor owns.
    ///
    /// Any status may follow any other. Returns `None` when not owned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_status_owned(
        &self,
        id: OrderId,
        vendor_id: UserId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "UPDATE orders AS o SET status = $3 \
             WHERE o.id = $1 AND o.vendor_id = $2 \
             RETURNING ",
            order_columns!()
        ))
        .bind(id.as_i32())
        .bind(vendor_id.as_i32())
        .bind(status)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Place an order atomically.
    ///
    /// Prices come from the database, never from the request. When the
    /// order has a buyer a `PlaceOrder` interaction is recorded in the same
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns `PlaceOrderError::UnavailableProduct` or
    /// `PlaceOrderError::InsufficientStock` when a line cannot be filled,
    /// `PlaceOrderError::TotalTooLarge` when the total overflows the column,
    /// and `PlaceOrderError::Repository` for database failures. Nothing is
    /// written in any error case.
    pub async fn place(&self, new: &NewOrder) -> Result<Order, PlaceOrderError> {
        let mut tx = self.pool.begin().await?;

        let mut snapshots = Vec::with_capacity(new.lines.len());
        let mut total = Decimal::ZERO;

        for line in &new.lines {
            let product = sqlx::query_as::<_, LockedProduct>(
                "SELECT name, price, stock FROM products \
                 WHERE id = $1 AND vendor_id = $2 AND is_active \
                 FOR UPDATE",
            )
            .bind(line.product_id.as_i32())
            .bind(new.vendor_id.as_i32())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(PlaceOrderError::UnavailableProduct(line.product_id))?;

            if product.stock.is_some() {
                let decremented = sqlx::query(
                    "UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
                )
                .bind(line.product_id.as_i32())
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;

                if decremented.rows_affected() == 0 {
                    return Err(PlaceOrderError::InsufficientStock {
                        product_id: line.product_id,
                        name: product.name,
                    });
                }
            }

            total += product.price * Decimal::from(line.quantity);
            snapshots.push((line.product_id, product, line.quantity));
        }

        if total > MAX_AMOUNT {
            return Err(PlaceOrderError::TotalTooLarge(total));
        }

        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "INSERT INTO orders AS o (vendor_id, buyer_id, buyer_name, buyer_phone, buyer_email, \
             delivery_address, notes, total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING ",
            order_columns!()
        ))
        .bind(new.vendor_id.as_i32())
        .bind(new.buyer_id.map(|id| id.as_i32()))
        .bind(&new.buyer_name)
        .bind(&new.buyer_phone)
        .bind(new.buyer_email.as_deref())
        .bind(&new.delivery_address)
        .bind(new.notes.as_deref())
        .bind(total)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(snapshots.len());
        for (product_id, product, quantity) in snapshots {
            let item = sqlx::query_as::<_, OrderItem>(
                "INSERT INTO order_items (order_id, product_id, name, unit_price, quantity) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id, order_id, product_id, name, unit_price, quantity",
            )
            .bind(row.id.as_i32())
            .bind(product_id.as_i32())
            .bind(&product.name)
            .bind(product.price)
            .bind(quantity)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);
        }

        if let Some(buyer_id) = new.buyer_id {
            sqlx::query(
                "INSERT INTO buyer_interactions (buyer_id, vendor_id, action) VALUES ($1, $2, $3)",
            )
            .bind(buyer_id.as_i32())
            .bind(new.vendor_id.as_i32())
            .bind(InteractionAction::PlaceOrder)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(row.into_order(items))
    }

    /// Orders matching an id or a buyer phone number, newest first, with the
    /// vendor's contact details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn track(
        &self,
        order_id: Option<OrderId>,
        phone: Option<&str>,
    ) -> Result<Vec<TrackedOrder>, RepositoryError> {
        let rows = sqlx::query_as::<_, TrackedOrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            ", u.business_name AS vendor_business_name, u.phone AS vendor_phone \
             FROM orders o JOIN users u ON u.id = o.vendor_id \
             WHERE ($1::int IS NULL OR o.id = $1) \
               AND ($2::text IS NULL OR o.buyer_phone = $2) \
             ORDER BY o.created_at DESC, o.id DESC"
        ))
        .bind(order_id.map(|id| id.as_i32()))
        .bind(phone)
        .fetch_all(self.pool)
        .await?;

        let mut contacts = Vec::with_capacity(rows.len());
        let mut headers = Vec::with_capacity(rows.len());
        for row in rows {
            contacts.push((row.vendor_business_name, row.vendor_phone));
            headers.push(row.order);
        }

        let orders = self.attach_items(headers).await?;
        orders
            .into_iter()
            .zip(contacts)
            .map(|(order, (business_name, vendor_phone))| {
                let vendor_business_name = business_name.ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "order {} belongs to a non-vendor account",
                        order.id
                    ))
                })?;
                Ok(TrackedOrder {
                    order,
                    vendor_business_name,
                    vendor_phone,
                })
            })
            .collect()
    }

    /// Dashboard aggregates: sales since each window start, plus pending,
    /// total and distinct-customer counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn totals_for_vendor(
        &self,
        vendor_id: UserId,
        today: DateTime<Utc>,
        week: DateTime<Utc>,
        month: DateTime<Utc>,
    ) -> Result<OrderTotals, RepositoryError> {
        let totals = sqlx::query_as::<_, OrderTotals>(
            "SELECT \
                 COALESCE(SUM(total) FILTER (WHERE status <> $5 AND created_at >= $2), 0) AS today_sales, \
                 COALESCE(SUM(total) FILTER (WHERE status <> $5 AND created_at >= $3), 0) AS week_sales, \
                 COALESCE(SUM(total) FILTER (WHERE status <> $5 AND created_at >= $4), 0) AS month_sales, \
                 COUNT(*) FILTER (WHERE status = $6) AS pending_orders, \
                 COUNT(*) AS total_orders, \
                 COUNT(DISTINCT buyer_phone) AS total_customers \
             FROM orders WHERE vendor_id = $1",
        )
        .bind(vendor_id.as_i32())
        .bind(today)
        .bind(week)
        .bind(month)
        .bind(OrderStatus::Cancelled)
        .bind(OrderStatus::Pending)
        .fetch_one(self.pool)
        .await?;

        Ok(totals)
    }

    /// Sum and count of non-cancelled orders with `from <= created_at < to`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_between(
        &self,
        vendor_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(Decimal, i64), RepositoryError> {
        let sales = sqlx::query_as::<_, (Decimal, i64)>(
            "SELECT COALESCE(SUM(total), 0), COUNT(*) FROM orders \
             WHERE vendor_id = $1 AND status <> $4 AND created_at >= $2 AND created_at < $3",
        )
        .bind(vendor_id.as_i32())
        .bind(from)
        .bind(to)
        .bind(OrderStatus::Cancelled)
        .fetch_one(self.pool)
        .await?;

        Ok(sales)
    }
}
