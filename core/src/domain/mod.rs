// orderflow/src/domain/mod.rs

//! Order aggregate, payment lattice, inventory reservation and the pure
//! reconciliation rules shared by every store implementation.

pub mod actor;
pub mod inventory;
pub mod notification;
pub mod order;
pub mod payment;
pub mod reconcile;

pub use actor::Actor;
pub use inventory::{Product, Shortfall, StockRequest};
pub use notification::{GatewayNotification, VerifiedNotification};
pub use order::{CloseReason, LineItem, Order, OrderParts, OrderStatus, ShippingAddress};
pub use payment::{Payment, PaymentSession, PaymentStatus};
pub use reconcile::{ReconcilePlan, Reconciliation};
