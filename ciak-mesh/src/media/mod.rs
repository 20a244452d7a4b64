mod media_engine;
mod media_event;
mod webrtc_engine;

pub use media_engine::*;
pub use media_event::*;
pub use webrtc_engine::*;
