pub use wisp_core::model::{PeerId, RoomId};

pub mod model {
    pub use wisp_core::model::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use wisp_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use wisp_client::*;
}
