//! Domain models returned by repositories and serialized by handlers.

pub mod automation;
pub mod order;
pub mod product;
pub mod user;

pub use automation::{AutoPost, AutoPostInput, BuyerInteraction, Customer, CustomerInterest};
pub use order::{NewOrder, NewOrderLine, Order, OrderItem, TrackedOrder};
pub use product::{
    AMOUNT_SCALE, MAX_AMOUNT, Product, ProductFilter, ProductInput, ProductSort, ProductWithVendor,
};
pub use user::{NewUser, User, UserProfile, VendorSummary};
