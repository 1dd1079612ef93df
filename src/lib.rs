//! # Enterprise API Library
//!
//! REST resources over the enterprise customer data model, with proxies to
//! the external course catalog service.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod permissions;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub mod throttle;
pub use migration;
