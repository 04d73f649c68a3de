//! VTU settlement backend: wallet funding via dedicated virtual accounts,
//! commit-before-vend purchase settlement, and reseller requery plumbing.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
pub mod vending;
pub mod workers;
