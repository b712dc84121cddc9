//! Request extractors.

mod admin;
pub use admin::AdminSession;
