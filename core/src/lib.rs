// src/lib.rs

//! orderflow: the order and payment core of a storefront backend.
//!
//! It covers:
//!  - The order aggregate and its `PENDING → PAID | CANCELED | EXPIRED` state machine.
//!  - All-or-nothing stock reservation, released exactly once when an order closes unpaid.
//!  - Payment-session creation with at most one active payment per order.
//!  - A webhook reconciler that authenticates gateway notifications and merges them
//!    through a monotonic status lattice, so duplicates and late arrivals are no-ops.
//!  - Time-based expiry of unpaid orders.
//!
//! Storage and the gateway sit behind the traits in [`ports`] and [`gateway`].
//! [`MemoryStore`] and [`MockGateway`] implement them in-process.

pub mod domain;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod ports;
pub mod service;
pub mod workflow;

// --- Re-exports for the Public API ---

pub use crate::domain::{
  Actor, CloseReason, GatewayNotification, LineItem, Order, OrderParts, OrderStatus, Payment, PaymentSession,
  PaymentStatus, Product, Reconciliation, ShippingAddress, Shortfall, StockRequest, VerifiedNotification,
};
pub use crate::error::{OrderError, OrderResult};
pub use crate::gateway::{CustomerDetails, GatewaySession, GatewayStatus, MockGateway, PaymentGateway, SessionRequest};
pub use crate::memory::MemoryStore;
pub use crate::ports::{Catalog, OrderStore, Page, PaymentStore, SlotClaim};
pub use crate::service::{NewOrder, OrderLine, OrderService, OrderStatusView, PaymentView, ServiceConfig};
pub use crate::workflow::{ContextData, Pipeline, StepControl, WorkflowError, WorkflowOutcome};
