//! Domain models persisted by the storage layer.

mod entities;
mod store;

pub use entities::{Customer, LineItem, Order, Product, ProductSales};
pub use store::{DateWindow, NewStore, ShopCredentials, Store, StoreTeardown, SyncStatus};
