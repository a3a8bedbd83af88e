/// State management module
///
/// This module holds all client-side state, including:
/// - Shared data structures (data.rs)
/// - File staging and validation (intake.rs)
/// - The multipart transfer and its progress (transfer.rs)
/// - The upload/processing lifecycle (session.rs)
/// - The ordered NDVI results and their navigation (results.rs, timeline.rs)
/// - Project list and AI insight panels (projects.rs, insights.rs)

pub mod data;
pub mod insights;
pub mod intake;
pub mod projects;
pub mod results;
pub mod session;
pub mod timeline;
pub mod transfer;
