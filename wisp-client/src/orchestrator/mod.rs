mod orchestrator;
mod room_handle;
mod room_loop;
mod room_observer;

pub use orchestrator::*;
pub use room_handle::*;
pub use room_observer::*;
