//! Runtime-free model of the ciak signaling protocol: peer descriptors,
//! session descriptions, ICE candidates, the framed wire message and its
//! line codec, and the port plan used to address mesh links.

pub mod codec;
pub mod model;

pub use codec::{Action, CodecError, Envelope};
pub use model::*;
