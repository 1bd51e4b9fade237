//! Backend REST API access.

pub mod client;

pub use client::{fetch_statuses, parse_events_body, ApiClient, ApiError, LeadSource};
