pub use ciak_core::model::{Director, PeerDescriptor, PeerId};

pub mod model {
    pub use ciak_core::model::*;
}

pub mod codec {
    pub use ciak_core::codec::*;
}

#[cfg(feature = "mesh")]
pub mod mesh {
    pub use ciak_mesh::*;
}
