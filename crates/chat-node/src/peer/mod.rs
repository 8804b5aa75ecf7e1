//! Peer routing: RPCs to other nodes over the peer protocol variant

mod connector;
mod router;

pub use connector::{PeerConnection, PeerConnector};
pub use router::TcpPeerRouter;
