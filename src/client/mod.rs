//! Non-visual core of the single-page client.
//!
//! - [`pages`]: path to page resolution and the interactive page state
//! - [`counter`]: the in-memory counter shown on the interactive page
//! - [`probe`]: the one outbound health fetch, with a fixed fallback

pub mod counter;
pub mod pages;
pub mod probe;

pub use counter::Counter;
pub use pages::{AppPage, Page};
pub use probe::{HealthProbe, FALLBACK_MESSAGE};
