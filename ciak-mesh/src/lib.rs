pub mod channel;
pub mod config;
pub mod error;
pub mod lobby;
pub mod media;
pub mod room;
pub mod session;

pub use channel::*;
pub use config::*;
pub use error::*;
pub use lobby::*;
pub use media::*;
pub use room::*;
pub use session::*;
