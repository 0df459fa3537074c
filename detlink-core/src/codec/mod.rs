//! Wire codec for detection messages.
//!
//! [`wire`] holds the pure text parser/printer. [`DetectionCodec`]
//! adapts it to `tokio_util`'s framing traits for datagram transports,
//! where one datagram carries exactly one message.

pub mod wire;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::DetlinkError;
use crate::labels::LabelTable;
use crate::message::DetectionMessage;

pub use wire::{decode, decode_payload, encode, encode_into};

/// Datagram codec carrying one [`DetectionMessage`] per frame.
#[derive(Debug, Clone, Default)]
pub struct DetectionCodec {
    labels: LabelTable,
}

impl DetectionCodec {
    pub fn new(labels: LabelTable) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

impl Decoder for DetectionCodec {
    type Item = DetectionMessage;
    type Error = DetlinkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        // The whole buffer is one message; consume it even if it is bad
        // so the next datagram starts clean.
        let payload = src.split();
        let message = wire::decode_payload(&payload, &self.labels)?;
        Ok(Some(message))
    }
}

impl Encoder<DetectionMessage> for DetectionCodec {
    type Error = DetlinkError;

    fn encode(&mut self, item: DetectionMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        wire::encode_into(&item, dst);
        Ok(())
    }
}
