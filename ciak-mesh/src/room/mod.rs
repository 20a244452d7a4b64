mod room;
mod room_command;
mod room_event;
mod room_handle;
mod room_state;
mod segment;

pub use room::*;
pub use room_command::*;
pub use room_event::*;
pub use room_handle::*;
pub use room_state::{RoomSnapshot, SessionSnapshot};
pub use segment::Segment;
