//! Database reset and demo seed.
//!
//! # Usage
//!
//! ```bash
//! # Delete everything
//! ms-cli reset
//!
//! # Delete everything, then create 4 vendors, 3 buyers and 8 products
//! ms-cli reset --seed
//! ```
//!
//! Every demo account uses the password `password123`.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use marketstall_api::services::auth::{generate_catalog_id, hash_password};
use marketstall_core::Role;

use super::{CliError, connect};

/// Password shared by all demo accounts.
pub const DEMO_PASSWORD: &str = "password123";

pub struct DemoVendor {
    pub email: &'static str,
    pub name: &'static str,
    pub business_name: &'static str,
    pub phone: &'static str,
    pub about: &'static str,
}

pub struct DemoBuyer {
    pub email: &'static str,
    pub name: &'static str,
    pub phone: &'static str,
    pub address: &'static str,
}

pub struct DemoProduct {
    /// Index into [`VENDORS`].
    pub vendor: usize,
    pub name: &'static str,
    pub price: i64,
    pub description: &'static str,
    pub category: &'static str,
    pub featured: bool,
    pub stock: i32,
}

pub const VENDORS: [DemoVendor; 4] = [
    DemoVendor {
        email: "vendor1@example.com",
        name: "John Smith",
        business_name: "Tech Solutions Ltd",
        phone: "+234-801-234-5678",
        about: "Leading provider of technology solutions and gadgets",
    },
    DemoVendor {
        email: "vendor2@example.com",
        name: "Sarah Johnson",
        business_name: "Fashion Hub",
        phone: "+234-802-345-6789",
        about: "Premium fashion and accessories for modern lifestyle",
    },
    DemoVendor {
        email: "vendor3@example.com",
        name: "Mike Wilson",
        business_name: "Home & Garden Store",
        phone: "+234-803-456-7890",
        about: "Everything you need for your home and garden",
    },
    DemoVendor {
        email: "vendor4@example.com",
        name: "Lisa Brown",
        business_name: "Healthy Foods Market",
        phone: "+234-804-567-8901",
        about: "Organic and healthy food products",
    },
];

pub const BUYERS: [DemoBuyer; 3] = [
    DemoBuyer {
        email: "buyer1@example.com",
        name: "Alice Cooper",
        phone: "+234-805-678-9012",
        address: "123 Main Street, Lagos",
    },
    DemoBuyer {
        email: "buyer2@example.com",
        name: "Bob Davis",
        phone: "+234-806-789-0123",
        address: "456 Oak Avenue, Abuja",
    },
    DemoBuyer {
        email: "buyer3@example.com",
        name: "Carol White",
        phone: "+234-807-890-1234",
        address: "789 Pine Road, Port Harcourt",
    },
];

pub const PRODUCTS: [DemoProduct; 8] = [
    DemoProduct {
        vendor: 0,
        name: "Wireless Bluetooth Headphones",
        price: 15_000,
        description: "High-quality wireless headphones with noise cancellation",
        category: "electronics",
        featured: true,
        stock: 50,
    },
    DemoProduct {
        vendor: 0,
        name: "Smartphone Stand",
        price: 3_500,
        description: "Adjustable phone stand for desk use",
        category: "electronics",
        featured: false,
        stock: 100,
    },
    DemoProduct {
        vendor: 1,
        name: "Designer Handbag",
        price: 25_000,
        description: "Elegant leather handbag for professional women",
        category: "fashion",
        featured: true,
        stock: 20,
    },
    DemoProduct {
        vendor: 1,
        name: "Casual T-Shirt",
        price: 5_000,
        description: "Comfortable cotton t-shirt in various colors",
        category: "fashion",
        featured: false,
        stock: 75,
    },
    DemoProduct {
        vendor: 2,
        name: "Indoor Plant Pot",
        price: 2_500,
        description: "Ceramic pot perfect for indoor plants",
        category: "home",
        featured: false,
        stock: 30,
    },
    DemoProduct {
        vendor: 2,
        name: "LED Table Lamp",
        price: 8_000,
        description: "Modern LED lamp with adjustable brightness",
        category: "home",
        featured: true,
        stock: 25,
    },
    DemoProduct {
        vendor: 3,
        name: "Organic Honey",
        price: 4_500,
        description: "Pure organic honey from local beekeepers",
        category: "food",
        featured: false,
        stock: 40,
    },
    DemoProduct {
        vendor: 3,
        name: "Mixed Nuts Pack",
        price: 3_000,
        description: "Healthy mix of almonds, cashews, and walnuts",
        category: "food",
        featured: true,
        stock: 60,
    },
];

/// Truncate every table, restarting id sequences.
pub async fn truncate_all(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "TRUNCATE buyer_interactions, customer_interests, customers, auto_posts, \
         order_items, orders, products, users RESTART IDENTITY CASCADE",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert the demo accounts and products in one transaction.
pub async fn seed(pool: &PgPool) -> Result<(), CliError> {
    let password_hash = hash_password(DEMO_PASSWORD)?;
    let mut tx = pool.begin().await?;

    let mut vendor_ids = Vec::with_capacity(VENDORS.len());
    for vendor in &VENDORS {
        let id = insert_vendor(&mut tx, vendor, &password_hash).await?;
        vendor_ids.push(id);
    }

    for buyer in &BUYERS {
        sqlx::query(
            "INSERT INTO users (email, password_hash, role, name, phone, address, is_verified) \
             VALUES ($1, $2, $3, $4, $5, $6, TRUE)",
        )
        .bind(buyer.email)
        .bind(&password_hash)
        .bind(Role::Buyer)
        .bind(buyer.name)
        .bind(buyer.phone)
        .bind(buyer.address)
        .execute(&mut *tx)
        .await?;
    }

    for (product, vendor_id) in PRODUCTS
        .iter()
        .filter_map(|p| vendor_ids.get(p.vendor).map(|id| (p, *id)))
    {
        sqlx::query(
            "INSERT INTO products (vendor_id, name, price, description, category, featured, stock) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(vendor_id)
        .bind(product.name)
        .bind(Decimal::from(product.price))
        .bind(product.description)
        .bind(product.category)
        .bind(product.featured)
        .bind(product.stock)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn insert_vendor(
    tx: &mut Transaction<'_, Postgres>,
    vendor: &DemoVendor,
    password_hash: &str,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO users (email, password_hash, role, name, phone, business_name, about, \
         catalog_id, is_verified) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE) RETURNING id",
    )
    .bind(vendor.email)
    .bind(password_hash)
    .bind(Role::Vendor)
    .bind(vendor.name)
    .bind(vendor.phone)
    .bind(vendor.business_name)
    .bind(vendor.about)
    .bind(generate_catalog_id())
    .fetch_one(&mut **tx)
    .await
}

/// Reset the database, optionally seeding demo data.
pub async fn run(with_seed: bool) -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::warn!("Clearing all marketplace data...");
    truncate_all(&pool).await?;
    tracing::info!("Database cleared");

    if !with_seed {
        return Ok(());
    }

    seed(&pool).await?;

    tracing::info!("Demo data created");
    for vendor in &VENDORS {
        tracing::info!("  vendor {} <{}>", vendor.business_name, vendor.email);
    }
    for buyer in &BUYERS {
        tracing::info!("  buyer  {} <{}>", buyer.name, buyer.email);
    }
    tracing::info!("  {} products", PRODUCTS.len());
    tracing::info!("All accounts use password: {DEMO_PASSWORD}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_product_has_a_vendor() {
        assert!(PRODUCTS.iter().all(|p| p.vendor < VENDORS.len()));
        for vendor in 0..VENDORS.len() {
            assert_eq!(PRODUCTS.iter().filter(|p| p.vendor == vendor).count(), 2);
        }
    }

    #[test]
    fn test_demo_emails_are_normalized_and_unique() {
        let mut emails: Vec<&str> = VENDORS
            .iter()
            .map(|v| v.email)
            .chain(BUYERS.iter().map(|b| b.email))
            .collect();
        assert!(emails.iter().all(|e| *e == e.trim().to_lowercase()));
        emails.sort_unstable();
        emails.dedup();
        assert_eq!(emails.len(), VENDORS.len() + BUYERS.len());
    }

    #[test]
    fn test_four_featured_products() {
        assert_eq!(PRODUCTS.iter().filter(|p| p.featured).count(), 4);
    }
}
