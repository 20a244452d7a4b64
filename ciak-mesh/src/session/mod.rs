mod negotiation_state;
mod peer_session;
mod session_command;
mod session_event;

pub use negotiation_state::*;
pub use peer_session::*;
pub use session_command::*;
pub use session_event::*;
