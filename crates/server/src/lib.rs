//! Voxcard HTTP server
//!
//! Exposes the paced synthesis pipeline over REST and serves finished
//! audio artifacts as static files.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;
