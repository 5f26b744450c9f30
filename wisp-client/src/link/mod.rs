mod link_provider;
mod link_worker;
mod webrtc_link;

pub use link_provider::*;
pub(crate) use link_worker::LinkWorker;
pub use webrtc_link::*;
