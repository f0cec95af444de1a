//! Auditor - runs storefront build audits and streams their progress
//!
//! The audit engine lives in [`audit`]; [`rest`] exposes it over HTTP and a
//! WebSocket feed.

pub mod audit;
pub mod config;
pub mod logging;
pub mod rest;
pub mod types;
