mod local_bus;
mod reconnect;
mod relay;
mod signaling_transport;

pub use local_bus::*;
pub use reconnect::*;
pub use relay::*;
pub use signaling_transport::*;
