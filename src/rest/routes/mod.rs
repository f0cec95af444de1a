//! Route handlers for the REST API.

pub mod audit;
pub mod dashboard;
pub mod health;
pub mod issues;
pub mod ws;
