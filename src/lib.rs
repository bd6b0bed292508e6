//! Order and proof-of-delivery workflows for the fulfillment service.

pub mod api;
pub mod clients;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod pagination;
pub mod permissions;
pub mod repository;
pub mod utils;
pub mod workflow;

#[cfg(test)]
mod test_support;
