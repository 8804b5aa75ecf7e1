//! Length-prefixed frame codec
//!
//! ```text
//! Standard: | msg_id u32 | body_len u32 | body |
//! Compact:  | msg_id u16 | body_len u16 | body |
//! Peer:     | from_uid u64 | device_id u16 | msg_id u32 | body_len u32 | body |
//! ```
//!
//! The decoder is an explicit two-state machine. A partial header or body
//! leaves the state untouched and waits for more bytes.

use std::io;
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use super::frame::{Frame, PeerRoute, ProtocolVariant};
use super::state::{ConnectionState, StateCell};

/// Errors raised while reading or writing frames
#[derive(Debug, Error)]
pub enum FrameError {
    /// Header announced a body larger than the configured maximum
    #[error("Frame body of {len} bytes exceeds maximum of {max}")]
    Oversized { len: usize, max: usize },

    /// Stream ended in the middle of a frame
    #[error("Connection closed with {buffered} bytes of an incomplete frame")]
    ShortFrame { buffered: usize },

    /// Message id does not fit the header variant
    #[error("Message id {0} does not fit the header")]
    MsgIdOutOfRange(u32),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Connection reset by peer")]
    ConnectionReset,

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl FrameError {
    /// Malformed or truncated input, as opposed to a transport failure
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::Oversized { .. } | Self::ShortFrame { .. } | Self::MsgIdOutOfRange(_)
        )
    }
}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Self::ConnectionClosed,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::ConnectionReset,
            _ => Self::Io(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameHeader {
    msg_id: u32,
    body_len: usize,
    route: Option<PeerRoute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    HeaderWait,
    BodyWait(FrameHeader),
}

/// Codec for one header variant
#[derive(Debug)]
pub struct FrameCodec {
    variant: ProtocolVariant,
    max_body_length: usize,
    state: DecodeState,
    observer: Option<Arc<StateCell>>,
}

impl FrameCodec {
    pub fn new(variant: ProtocolVariant, max_body_length: usize) -> Self {
        Self {
            variant,
            max_body_length: max_body_length.min(variant.max_encodable_body()),
            state: DecodeState::HeaderWait,
            observer: None,
        }
    }

    /// Mirror decode state transitions into `cell`
    pub fn observed(mut self, cell: Arc<StateCell>) -> Self {
        self.observer = Some(cell);
        self
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    pub fn max_body_length(&self) -> usize {
        self.max_body_length
    }

    /// True while a header has been consumed but its body has not arrived
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.state, DecodeState::BodyWait(_))
    }

    fn transition(&mut self, state: DecodeState) {
        self.state = state;
        if let Some(cell) = &self.observer {
            cell.set(match state {
                DecodeState::HeaderWait => ConnectionState::HeaderWait,
                DecodeState::BodyWait(_) => ConnectionState::BodyWait,
            });
        }
    }

    fn decode_header(&self, src: &mut BytesMut) -> FrameHeader {
        match self.variant {
            ProtocolVariant::Standard => FrameHeader {
                msg_id: src.get_u32(),
                body_len: src.get_u32() as usize,
                route: None,
            },
            ProtocolVariant::Compact => FrameHeader {
                msg_id: u32::from(src.get_u16()),
                body_len: usize::from(src.get_u16()),
                route: None,
            },
            ProtocolVariant::Peer => {
                let from_uid = src.get_u64();
                let device_id = src.get_u16();
                FrameHeader {
                    msg_id: src.get_u32(),
                    body_len: src.get_u32() as usize,
                    route: Some(PeerRoute {
                        from_uid,
                        device_id,
                    }),
                }
            }
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if self.state == DecodeState::HeaderWait {
            let header_len = self.variant.header_len();
            if src.len() < header_len {
                return Ok(None);
            }

            let header = self.decode_header(src);
            if header.body_len > self.max_body_length {
                // Header bytes are consumed; the stream cannot be resynchronized.
                return Err(FrameError::Oversized {
                    len: header.body_len,
                    max: self.max_body_length,
                });
            }
            self.transition(DecodeState::BodyWait(header));
        }

        let DecodeState::BodyWait(header) = self.state else {
            return Ok(None);
        };

        if src.len() < header.body_len {
            src.reserve(header.body_len - src.len());
            return Ok(None);
        }

        let body = src.split_to(header.body_len).freeze();
        self.transition(DecodeState::HeaderWait);

        Ok(Some(Frame {
            msg_id: header.msg_id,
            body,
            route: header.route,
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() && !self.is_mid_frame() {
            Ok(None)
        } else {
            Err(FrameError::ShortFrame {
                buffered: src.len(),
            })
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        let body_len = item.body.len();
        if body_len > self.max_body_length {
            return Err(FrameError::Oversized {
                len: body_len,
                max: self.max_body_length,
            });
        }
        if item.msg_id > self.variant.max_msg_id() {
            return Err(FrameError::MsgIdOutOfRange(item.msg_id));
        }

        dst.reserve(self.variant.header_len() + body_len);
        match self.variant {
            ProtocolVariant::Standard => {
                dst.put_u32(item.msg_id);
                dst.put_u32(body_len as u32);
            }
            ProtocolVariant::Compact => {
                dst.put_u16(item.msg_id as u16);
                dst.put_u16(body_len as u16);
            }
            ProtocolVariant::Peer => {
                let route = item.route.unwrap_or_default();
                dst.put_u64(route.from_uid);
                dst.put_u16(route.device_id);
                dst.put_u32(item.msg_id);
                dst.put_u32(body_len as u32);
            }
        }
        dst.put_slice(&item.body);

        Ok(())
    }
}
