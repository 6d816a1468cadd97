//! Command handler modules
//!
//! One module per group of CLI subcommands; `main.rs` only parses arguments
//! and dispatches here.

pub mod context;
pub mod history;
pub mod init;
pub mod sync;
pub mod write;

pub use context::SyncContext;
pub use history::{handle_history_clear, handle_history_list};
pub use init::{handle_init, InitOptions};
pub use sync::{handle_pending, handle_status, handle_sync, handle_watch};
pub use write::handle_write;
