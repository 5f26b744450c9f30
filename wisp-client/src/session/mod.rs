mod peer_session;
mod session_command;
mod session_manager;

pub use peer_session::*;
pub use session_command::*;
pub use session_manager::*;
