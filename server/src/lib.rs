// storefront/src/lib.rs

//! HTTP storefront backend: accounts, orders and Midtrans payments over
//! PostgreSQL, with the order and payment rules delegated to `orderflow`.

pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod sweeper;
pub mod web;
