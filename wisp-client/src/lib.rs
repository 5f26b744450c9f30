mod config;
mod error;
mod link;
mod orchestrator;
mod session;
mod transport;

pub use config::ClientConfig;
pub use error::{Result, WispError};
pub use link::*;
pub use orchestrator::*;
pub use session::*;
pub use transport::*;
