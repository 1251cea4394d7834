//! invoicer-service: multi-tenant invoicing and stock management backend.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
