//! Domain services

pub mod scratchpad_service;
pub mod session_store;
pub mod sweeper;
pub mod tool_channel;
pub mod tool_dispatcher;

pub use scratchpad_service::ScratchpadService;
pub use session_store::SessionStore;
pub use sweeper::spawn_sweeper;
pub use tool_channel::{ToolChannel, ToolChannelFactory};
pub use tool_dispatcher::ToolDispatcher;
