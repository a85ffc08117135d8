#![doc(test(attr(deny(warnings))))]

//! Ledger Core is a double-entry ledger engine for single-user personal
//! finance tracking: accounting calculus, balance computation, running-balance
//! rebuilds, integrity repair, hierarchy rules, audit trail, and
//! multi-currency wealth aggregation.

pub mod config;
pub mod core;
pub mod currency;
pub mod domain;
pub mod errors;
pub mod import;
pub mod notify;
pub mod store;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Ledger Core tracing initialized.");
    });
}
