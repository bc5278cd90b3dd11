//! Push listener
//!
//! Small HTTP surface through which the panel pushes profile changes
//! instead of waiting for the next poll.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{AppState, PushServer};
