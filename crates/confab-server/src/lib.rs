//! HTTP surface for confab: session upload, listing, detail, titles and
//! shares, with access resolution and privacy filtering from `confab-core`.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{build_router, start, ServerHandle};
pub use state::AppState;
