//! TUI view components
//!
//! Each component renders one part of the dashboard from plain data; none
//! of them hold state.

mod clusters;
mod footer;
mod header;
pub mod helpers;
mod tables;

pub use clusters::*;
pub use footer::*;
pub use header::*;
pub use tables::*;
