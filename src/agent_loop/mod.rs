//! Agent loop: runs, tool-mode policy, cancellation, and run events.

pub mod cancel;
pub mod events;
pub mod runner;
pub mod tool_mode;
pub mod types;

pub use cancel::CancellationController;
pub use events::*;
pub use runner::*;
pub use tool_mode::ToolMode;
pub use types::*;
