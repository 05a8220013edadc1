//! WhatsApp share cards for products.

use serde::Serialize;

use marketstall_core::{CurrencyCode, Price};

use crate::models::Product;

/// A ready-to-share product message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareCard {
    pub text: String,
    pub image: Option<String>,
    pub whatsapp_url: String,
}

/// Public catalog page for a vendor.
#[must_use]
pub fn catalog_url(public_base_url: &str, catalog_id: &str) -> String {
    format!("{}/catalog/{catalog_id}", public_base_url.trim_end_matches('/'))
}

/// Build the share card for `product`, linking to the vendor's catalog.
#[must_use]
pub fn product_card(product: &Product, catalog_url: &str) -> ShareCard {
    let currency = product.currency.parse().unwrap_or(CurrencyCode::NGN);
    let price = Price::new(product.price, currency);

    let text = format!(
        "🛍️ *{}*\n\n💰 {}\n\n{}\n\n📱 Message me to order!\n{catalog_url}",
        product.name,
        price.display(),
        product.description,
    );
    let whatsapp_url = format!("https://wa.me/?text={}", urlencoding::encode(&text));

    ShareCard {
        text,
        image: product.image_url.clone(),
        whatsapp_url,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use marketstall_core::{ProductId, UserId};

    fn product() -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(3),
            vendor_id: UserId::new(1),
            name: "Designer Handbag".into(),
            price: "25000".parse().unwrap(),
            currency: "NGN".into(),
            description: "Genuine leather".into(),
            image_url: Some("https://img.example/bag.jpg".into()),
            category: "fashion".into(),
            payment_link: None,
            is_active: true,
            featured: true,
            views: 0,
            stock: Some(20),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_card_text() {
        let url = catalog_url("https://stall.example/", "ab12cd34ef");
        assert_eq!(url, "https://stall.example/catalog/ab12cd34ef");

        let card = product_card(&product(), &url);
        assert_eq!(
            card.text,
            "🛍️ *Designer Handbag*\n\n💰 ₦25,000\n\nGenuine leather\n\n📱 Message me to order!\nhttps://stall.example/catalog/ab12cd34ef"
        );
        assert_eq!(card.image.as_deref(), Some("https://img.example/bag.jpg"));
    }

    #[test]
    fn test_whatsapp_url_is_encoded() {
        let card = product_card(&product(), "https://stall.example/catalog/x");
        assert!(card.whatsapp_url.starts_with("https://wa.me/?text="));
        let encoded = card.whatsapp_url.trim_start_matches("https://wa.me/?text=");
        assert!(!encoded.contains(' '));
        assert!(!encoded.contains('\n'));
        assert_eq!(urlencoding::decode(encoded).unwrap(), card.text);
    }
}
