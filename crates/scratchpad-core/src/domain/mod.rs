//! Domain entities

pub mod rpc;
pub mod scope;
pub mod session;

pub use rpc::{RpcError, RpcRequest, RpcResponse};
pub use scope::{ScopeContext, ScratchpadScope};
pub use session::Session;
