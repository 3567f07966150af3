//! # Scratchpad Core
//!
//! Session lifecycle, scoped scratchpad storage and the tool dispatcher.

pub mod channel;
pub mod clock;
pub mod domain;
pub mod error;
pub mod repositories;
pub mod services;

pub use domain::*;
pub use error::{ChannelError, SessionError, ToolError};
