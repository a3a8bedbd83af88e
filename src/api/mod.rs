/// Backend access module
///
/// This module handles:
/// - The typed HTTP client for every backend endpoint (client.rs)
/// - Wire models and record normalization (models.rs)

pub mod client;
pub mod models;

pub use client::ApiClient;
