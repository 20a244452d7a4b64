use ciak_core::FramedMessage;
use tokio::sync::oneshot;

/// Requests the room makes of one peer session.
#[derive(Debug)]
pub enum SessionCommand {
    Send(FramedMessage),

    /// This device became director: announce it with `changeUser`, attach
    /// local video and re-offer once established.
    StartVideo,

    /// Another device became director. No renegotiation from this side.
    StopVideo,

    Dispose { done: oneshot::Sender<()> },
}
