//! HTTP handlers, grouped by resource.

pub mod sessions;
pub mod shares;
