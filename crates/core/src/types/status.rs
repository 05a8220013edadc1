//! Role and status enums shared by the server and the CLI.
//!
//! Every enum here is stored as a PostgreSQL enum type (see the `postgres`
//! feature) and uses the same lowercase spelling on the wire, except
//! [`InteractionAction`] which keeps the `PascalCase` names clients send.

use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Lists products and manages orders.
    Vendor,
    /// Browses the catalog and places orders.
    Buyer,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::Buyer => "buyer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vendor" => Ok(Self::Vendor),
            "buyer" => Ok(Self::Buyer),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Order lifecycle status.
///
/// Vendors may move an order between any two statuses; there is no
/// transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the order's total counts towards sales figures.
    #[must_use]
    pub const fn counts_as_sale(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// How far a customer has got with a product they asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "interest_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum InterestStatus {
    #[default]
    Interested,
    Negotiating,
    Purchased,
    Abandoned,
}

impl std::fmt::Display for InterestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interested => write!(f, "interested"),
            Self::Negotiating => write!(f, "negotiating"),
            Self::Purchased => write!(f, "purchased"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// A buyer action logged against a vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "interaction_action", rename_all = "snake_case")
)]
pub enum InteractionAction {
    MessageVendor,
    ViewProduct,
    AddToCart,
    PlaceOrder,
}

impl std::fmt::Display for InteractionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MessageVendor => write!(f, "MessageVendor"),
            Self::ViewProduct => write!(f, "ViewProduct"),
            Self::AddToCart => write!(f, "AddToCart"),
            Self::PlaceOrder => write!(f, "PlaceOrder"),
        }
    }
}

/// How often an auto-post would go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "post_frequency", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PostFrequency {
    #[default]
    Daily,
    Weekly,
    Custom,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Vendor).unwrap(), "\"vendor\"");
        assert_eq!("buyer".parse::<Role>(), Ok(Role::Buyer));
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_order_status_parse() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
        assert!("Pending".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_cancelled_is_not_a_sale() {
        assert!(!OrderStatus::Cancelled.counts_as_sale());
        assert!(OrderStatus::Delivered.counts_as_sale());
        assert!(OrderStatus::Pending.counts_as_sale());
    }

    #[test]
    fn test_interaction_action_keeps_pascal_case() {
        assert_eq!(
            serde_json::to_string(&InteractionAction::AddToCart).unwrap(),
            "\"AddToCart\""
        );
        let parsed: InteractionAction = serde_json::from_str("\"MessageVendor\"").unwrap();
        assert_eq!(parsed, InteractionAction::MessageVendor);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(PaymentStatus::default().to_string(), "pending");
        assert_eq!(InterestStatus::default().to_string(), "interested");
        assert_eq!(PostFrequency::default(), PostFrequency::Daily);
    }
}
