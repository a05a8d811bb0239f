//! Application module
//!
//! Dashboard state, key handling and rendering, split by concern.

pub mod state;

mod async_ops;
mod core;
mod events;
mod rendering;

pub use async_ops::ActionRunner;
pub use core::*;
pub use events::AppAction;
pub use state::{Focus, Tab};
