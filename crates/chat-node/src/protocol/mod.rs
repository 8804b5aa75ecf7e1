//! Wire protocol: message ids, error codes, frames and the frame codec

mod codec;
mod error_codes;
mod frame;
mod msg_id;
mod state;

pub use codec::{FrameCodec, FrameError};
pub use error_codes::ErrorCode;
pub use frame::{Frame, PeerRoute, ProtocolVariant};
pub use msg_id::MsgId;
pub use state::{ConnectionState, StateCell};
