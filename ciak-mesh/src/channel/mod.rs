mod channel_event;
pub mod frame;
mod framed_channel;

pub use channel_event::*;
pub use framed_channel::*;
