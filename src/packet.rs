//! Wire format of the ranging protocol
//!
//! A ranging event uses two kinds of packets:
//! 1. The tag sends a burst of [`TagPoll`] broadcasts. Each broadcast carries
//!    its subsequence number, so anchors know which slot of their
//!    time-of-arrival array to fill in, and the layout of the listening phase
//!    that follows the burst.
//! 2. Each anchor answers with a single [`AnchorFinal`], reporting when it
//!    received every broadcast and when it sent the answer itself.
//!
//! Both are IEEE 802.15.4 data frames with the same 15 byte header (short
//! broadcast destination, extended source address), followed by a message
//! type byte at offset [`HEADER_LEN`] and the message body. All fields are
//! little-endian. The two byte FCS is added by the radio and is not part of
//! the encoded buffer.

use core::convert::TryFrom;

use byte::{BytesExt as _, LE};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use ssmarshal;

use crate::{
    configs::{TagConfig, NUM_RANGING_BROADCASTS},
    error::CodecError,
    mac,
    time::Instant,
};


/// Length of the IEEE 802.15.4 header shared by all ranging packets
pub const HEADER_LEN: usize = 15;

/// Length of the frame check sequence appended by the radio
pub const FCS_LEN: usize = 2;

/// The largest frame the tag expects to receive, without FCS
pub const MAX_FRAME_LEN: usize = AnchorFinal::LEN;

/// Frame control field: data frame, PAN id compression, short destination
/// address, extended source address
const FRAME_CONTROL: u16 = 0xC841;

const MAX_BODY_LEN: usize = 4 + 8 * NUM_RANGING_BROADCASTS;


/// Identifies the message following the frame header
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MessageType {
    /// A broadcast sent by the tag
    TagPoll = 0x60,
    /// An anchor's consolidated timing report
    AnchorFinal = 0x61,
}


/// The IEEE 802.15.4 header of a ranging packet
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    /// Sequence number, wraps around silently
    pub seq: u8,
    /// PAN id of the ranging network
    pub pan_id: mac::PanId,
    /// Destination address, always the short broadcast address in practice
    pub destination: mac::ShortAddress,
    /// EUI of the sender
    pub source: mac::ExtendedAddress,
}

impl Header {
    /// Creates a header for a broadcast from `source`
    pub fn broadcast(pan_id: mac::PanId, source: mac::ExtendedAddress) -> Self {
        Header {
            seq: 0,
            pan_id,
            destination: mac::ShortAddress(0xffff),
            source,
        }
    }

    /// Writes the header to the start of `buf`
    ///
    /// Returns the number of bytes written, which is always [`HEADER_LEN`].
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        if buf.len() < HEADER_LEN {
            return Err(CodecError::BufferTooSmall {
                required_len: HEADER_LEN,
            });
        }

        let offset = &mut 0;
        buf.write_with(offset, FRAME_CONTROL, LE)?;
        buf[*offset] = self.seq;
        *offset += 1;
        buf.write_with(offset, self.pan_id.0, LE)?;
        buf.write_with(offset, self.destination.0, LE)?;
        buf.write_with(offset, self.source.0, LE)?;

        Ok(*offset)
    }

    /// Reads a header from the start of `buf`
    ///
    /// The frame control field is not checked. Frames that made it through the
    /// radio's frame filter are taken at face value.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let offset = &mut 0;
        let _frame_control: u16 = buf.read_with(offset, LE)?;
        let seq = *buf.get(*offset).ok_or(byte::Error::Incomplete)?;
        *offset += 1;

        Ok(Header {
            seq,
            pan_id: mac::PanId(buf.read_with(offset, LE)?),
            destination: mac::ShortAddress(buf.read_with(offset, LE)?),
            source: mac::ExtendedAddress(buf.read_with(offset, LE)?),
        })
    }
}


/// Implemented by the bodies of all ranging packets
pub trait Message: Sized + for<'de> Deserialize<'de> + Serialize {
    /// The message type that identifies this message on the wire
    const MESSAGE_TYPE: MessageType;

    /// The length of the serialized body
    const BODY_LEN: usize;

    /// The length of the whole packet, without FCS
    const LEN: usize = HEADER_LEN + 1 + Self::BODY_LEN;
}


/// A ranging packet: header plus message body
#[derive(Clone, Debug, PartialEq)]
pub struct Frame<T: Message> {
    /// The IEEE 802.15.4 header
    pub header: Header,
    /// The message body
    pub payload: T,
}

impl<T> Frame<T>
where
    T: Message,
{
    /// Serializes the packet into `buf`
    ///
    /// Returns the number of bytes written, which is always `T::LEN`.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        if buf.len() < T::LEN {
            return Err(CodecError::BufferTooSmall {
                required_len: T::LEN,
            });
        }

        let mut len = self.header.encode(buf)?;
        buf[len] = T::MESSAGE_TYPE.into();
        len += 1;
        len += ssmarshal::serialize(&mut buf[len..T::LEN], &self.payload)?;

        Ok(len)
    }

    /// Deserializes a body that might have been cut short
    ///
    /// Missing bytes are read as zero.
    fn decode_body(header: Header, body: &[u8]) -> Result<Self, CodecError> {
        let mut padded = [0; MAX_BODY_LEN];
        let available = body.len().min(T::BODY_LEN);
        padded[..available].copy_from_slice(&body[..available]);

        let (payload, _) = ssmarshal::deserialize::<T>(&padded[..T::BODY_LEN])?;

        Ok(Frame { header, payload })
    }
}


/// A broadcast sent by the tag during the first phase of a ranging event
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[repr(C)]
pub struct TagPoll {
    /// Index of this broadcast within the ranging event
    pub subsequence: u8,
    /// Index of the last broadcast; anchors reply after receiving it or
    /// missing its slot
    pub reply_after_subsequence: u8,
    /// Length of a listening window
    pub listening_window_us: u16,
    /// Length of an anchor's slot within a listening window
    pub listening_slot_us: u16,
}

impl TagPoll {
    /// Creates the first broadcast of an event as described by `config`
    pub fn new(config: &TagConfig) -> Self {
        TagPoll {
            subsequence: 0,
            reply_after_subsequence: config.num_broadcasts.saturating_sub(1),
            listening_window_us: config.listening_window_us,
            listening_slot_us: config.listening_slot_us,
        }
    }

    /// The number of broadcasts in the ranging event this poll belongs to
    pub fn broadcast_count(&self) -> usize {
        self.reply_after_subsequence as usize + 1
    }
}

impl Message for TagPoll {
    const MESSAGE_TYPE: MessageType = MessageType::TagPoll;
    const BODY_LEN: usize = 6;
}


/// An anchor's answer to a burst of broadcasts
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[repr(C)]
pub struct AnchorFinal {
    /// When this packet was sent, upper 32 bits of the anchor's system time
    pub dw_time_sent: u32,
    /// When the anchor received each broadcast, in anchor system time
    ///
    /// Indexed by subsequence. Zero means the broadcast wasn't received.
    pub toas: [u64; NUM_RANGING_BROADCASTS],
}

impl AnchorFinal {
    /// When this packet was sent, as a 40-bit timestamp
    pub fn tx_time(&self) -> Instant {
        Instant::from_hi32(self.dw_time_sent)
    }
}

impl Message for AnchorFinal {
    const MESSAGE_TYPE: MessageType = MessageType::AnchorFinal;
    const BODY_LEN: usize = MAX_BODY_LEN;
}


/// A decoded ranging packet
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// A tag's broadcast
    TagPoll(Frame<TagPoll>),
    /// An anchor's timing report
    AnchorFinal(Frame<AnchorFinal>),
    /// Not a ranging packet, or too short to tell
    Unknown {
        /// The byte found at the message type offset, if any
        message_type: Option<u8>,
    },
}

/// Decodes a received frame
///
/// `bytes` is whatever the radio received, without FCS. It may be shorter than
/// the packet its message type announces. In that case only the available
/// bytes are read and the rest of the body is taken to be zero. Frames with an
/// unknown message type are returned as [`Packet::Unknown`], not as an error.
pub fn decode(bytes: &[u8]) -> Result<Packet, CodecError> {
    let message_type = match bytes.get(HEADER_LEN) {
        Some(message_type) => *message_type,
        None => return Ok(Packet::Unknown { message_type: None }),
    };
    let message_type = match MessageType::try_from(message_type) {
        Ok(message_type) => message_type,
        Err(_) => {
            return Ok(Packet::Unknown {
                message_type: Some(message_type),
            })
        }
    };

    let header = Header::decode(bytes)?;
    let body = &bytes[HEADER_LEN + 1..];

    let packet = match message_type {
        MessageType::TagPoll => Packet::TagPoll(Frame::decode_body(header, body)?),
        MessageType::AnchorFinal => Packet::AnchorFinal(Frame::decode_body(header, body)?),
    };

    Ok(packet)
}
