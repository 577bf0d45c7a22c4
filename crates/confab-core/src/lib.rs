//! Domain core for confab: access resolution, privacy projection, list
//! entity tags and upload validation. Storage and HTTP live in sibling
//! crates and are reached only through the traits in [`store`].

pub mod access;
pub mod deadline;
pub mod errors;
pub mod etag;
pub mod grants;
pub mod ids;
pub mod models;
pub mod policy;
pub mod privacy;
pub mod sanitize;
pub mod store;
pub mod transcript;
pub mod upload;

pub use access::{AccessResolver, AccessType, Resolution};
pub use errors::{CoreError, Forbidden};
pub use etag::{ConditionalCache, EntityTag, ListView, Watermark};
pub use ids::{SessionId, ShareId, UserId};
pub use policy::{TierPolicies, UploadPolicy, UploadTier};
