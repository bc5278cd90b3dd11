//! Remote panel access
//!
//! Talks to the YaSSP panel over HTTP: pulls the profile list and pushes
//! traffic deltas. The panel flavor is fixed when the client is built.

mod client;
mod flavor;
pub mod translate;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{PanelAuth, PanelClient};
pub use flavor::PanelFlavor;
pub use translate::translate;
