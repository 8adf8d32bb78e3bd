//! Google Workspace adapters: Drive for audio, Docs for records.
//!
//! Both clients share one [`GoogleAuth`] so a single access token is
//! fetched and refreshed for the whole run.

pub mod auth;
pub mod docs;
pub mod drive;

pub use auth::{AuthError, GoogleAuth, ServiceAccountKey, SCOPES};
pub use docs::DocsClient;
pub use drive::DriveClient;
