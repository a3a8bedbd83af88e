//! Field Monitor: NDVI time-series dashboard
//!
//! The library holds everything except process startup, so the state
//! machines and the HTTP layer can be tested without a window.
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod imagery;
pub mod state;
pub mod ui;

#[cfg(test)]
mod test_support;
