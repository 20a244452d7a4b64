pub mod room_helpers;

pub use mock_media::*;
pub use room_helpers::*;
