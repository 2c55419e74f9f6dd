// storefront/src/services/mod.rs

pub mod auth_service;
pub mod midtrans;
pub mod tokens;
pub mod users;
