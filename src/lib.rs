//! Patronpay - creator payments core.
//!
//! Idempotent webhook ingestion from Stripe and Paystack, a versioned fee
//! engine, the subscription/payment ledger, and payout reconciliation.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
