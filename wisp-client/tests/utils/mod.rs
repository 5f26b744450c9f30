
pub use mock_link::*;
pub use recording_observer::*;
pub use relay::*;
