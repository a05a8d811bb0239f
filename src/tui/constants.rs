//! Constants used throughout the TUI module

/// Status message timeout in seconds
pub const STATUS_MESSAGE_TIMEOUT_SECS: u64 = 4;

/// Minimum terminal size required for the dashboard
pub const MIN_TERMINAL_WIDTH: u16 = 80;
pub const MIN_TERMINAL_HEIGHT: u16 = 16;

/// Header height including borders
pub const HEADER_HEIGHT: u16 = 6;

/// Footer height including borders
pub const FOOTER_HEIGHT: u16 = 3;

/// Width of the cluster list pane
pub const CLUSTER_PANE_WIDTH: u16 = 30;

/// Rows kept visible above and below the cursor while scrolling
pub const SCROLL_BUFFER: usize = 2;
