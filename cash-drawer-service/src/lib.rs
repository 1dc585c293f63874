//! Cash Drawer Service - drawer session accounting and payment
//! reconciliation core.

pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod services;
