//! Wire-format definitions for data-link frames.
//!
//! Every transmission between the two endpoints is a [`Frame`].  This module
//! is responsible for:
//! - Defining the on-wire binary layout (packed header, length, payload,
//!   checksum).
//! - Serialising a [`Frame`] into a byte buffer ready for the channel.
//! - Deserialising a raw byte slice back into a [`Frame`], returning errors
//!   for malformed, truncated, or corrupted input.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! ```text
//!  0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+
//! |Typ| Seq | Ack |   byte 0: header
//! +-+-+-+-+-+-+-+-+
//! |    Length     |   byte 1: payload length L (0–255)
//! +-+-+-+-+-+-+-+-+
//! |  Payload ...  |   bytes 2 .. 2+L
//! +-+-+-+-+-+-+-+-+
//! |   Checksum    |   last byte: sum of all preceding bytes mod 256
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! Total overhead: [`OVERHEAD`] = 3 bytes.

use thiserror::Error;

/// Size of the sequence-number space.  `seq` and `ack` are carried modulo
/// this value in three header bits.
pub const MAX_SEQ: u8 = 8;

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = 255;

/// Header + length + checksum bytes surrounding every payload.
pub const OVERHEAD: usize = 3;

// Byte offsets within the serialised frame.
const OFF_HEADER: usize = 0;
const OFF_LEN: usize = 1;
const OFF_PAYLOAD: usize = 2;

const SEQ_MASK: u8 = 0b111;
const KIND_MASK: u8 = 0b11;

// ---------------------------------------------------------------------------
// FrameKind
// ---------------------------------------------------------------------------

/// The two-bit frame type carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Carries a payload (and, when flowing back, a piggybacked ack).
    Data = 0,
    /// Standalone acknowledgement with an empty payload.
    Ack = 1,
}

impl TryFrom<u8> for FrameKind {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Data),
            1 => Ok(Self::Ack),
            other => Err(FrameError::InvalidKind(other)),
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Data => write!(f, "DATA"),
            Self::Ack => write!(f, "ACK"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A frame could not be constructed from the given field values.
///
/// This is a programming error on the building side; the operation that
/// tried to build the frame should be abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame type {0} is neither DATA (0) nor ACK (1)")]
    InvalidKind(u8),
    #[error("sequence number {0} is outside 0..=7")]
    SeqOutOfRange(u8),
    #[error("ack number {0} is outside 0..=7")]
    AckOutOfRange(u8),
    #[error("payload of {0} bytes exceeds the 255-byte maximum")]
    PayloadTooLarge(usize),
}

/// Errors that can arise when parsing a raw frame off the channel.
///
/// Every variant means "this frame is effectively lost"; the ARQ machinery
/// recovers through retransmission, never by surfacing the error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes than the fixed header, length and checksum.
    #[error("frame of {0} bytes is shorter than the 3-byte minimum")]
    Malformed(usize),
    /// The length byte disagrees with the number of bytes received.
    #[error("length field declares {declared} payload bytes but frame is {actual} bytes long")]
    LengthMismatch { declared: u8, actual: usize },
    /// The trailing checksum byte does not match the recomputed sum.
    #[error("checksum mismatch: computed {computed:#04x}, received {received:#04x}")]
    ChecksumMismatch { computed: u8, received: u8 },
    /// The checksum verified but the header carries an impossible field.
    #[error("invalid header: {0}")]
    Header(#[from] FrameError),
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A validated data-link frame.
///
/// Fields are private so that every `Frame` in existence satisfies the
/// range invariants; construct one with [`Frame::new`], [`Frame::data`],
/// [`Frame::ack_only`], or [`Frame::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    seq: u8,
    ack: u8,
    payload: Vec<u8>,
}

impl Frame {
    /// Build a frame, validating every field.
    pub fn new(kind: FrameKind, seq: u8, ack: u8, payload: Vec<u8>) -> Result<Self, FrameError> {
        if seq >= MAX_SEQ {
            return Err(FrameError::SeqOutOfRange(seq));
        }
        if ack >= MAX_SEQ {
            return Err(FrameError::AckOutOfRange(ack));
        }
        check_payload(&payload)?;
        Ok(Self {
            kind,
            seq,
            ack,
            payload,
        })
    }

    /// Build a frame from a raw two-bit type value.
    pub fn from_raw(kind: u8, seq: u8, ack: u8, payload: Vec<u8>) -> Result<Self, FrameError> {
        Self::new(FrameKind::try_from(kind)?, seq, ack, payload)
    }

    /// Shorthand for a DATA frame.
    pub fn data(seq: u8, ack: u8, payload: Vec<u8>) -> Result<Self, FrameError> {
        Self::new(FrameKind::Data, seq, ack, payload)
    }

    /// Standalone acknowledgement: `type = ACK`, `seq = 0`, empty payload.
    pub fn ack_only(ack: u8) -> Result<Self, FrameError> {
        Self::new(FrameKind::Ack, 0, ack, Vec::new())
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn seq(&self) -> u8 {
        self.seq
    }

    pub fn ack(&self) -> u8 {
        self.ack
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the frame and hand back its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// The packed header byte: `type(2) | seq(3) | ack(3)`.
    pub fn header(&self) -> u8 {
        ((self.kind as u8 & KIND_MASK) << 6) | ((self.seq & SEQ_MASK) << 3) | (self.ack & SEQ_MASK)
    }

    /// Serialise this frame into a newly allocated byte vector.
    ///
    /// The checksum is computed over every preceding byte and appended last.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(OVERHEAD + self.payload.len());
        buf.push(self.header());
        // check_payload guarantees the length fits in one byte.
        buf.push(self.payload.len() as u8);
        buf.extend_from_slice(&self.payload);
        buf.push(checksum(&buf));
        buf
    }

    /// Parse a [`Frame`] from a raw byte slice.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`OVERHEAD`],
    /// - the length byte disagrees with `buf.len()`,
    /// - the checksum does not verify, or
    /// - the header's type bits name neither DATA nor ACK.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < OVERHEAD {
            return Err(DecodeError::Malformed(buf.len()));
        }

        let declared = buf[OFF_LEN];
        if buf.len() != OVERHEAD + declared as usize {
            return Err(DecodeError::LengthMismatch {
                declared,
                actual: buf.len(),
            });
        }

        let (body, trailer) = buf.split_at(buf.len() - 1);
        let computed = checksum(body);
        let received = trailer[0];
        if computed != received {
            return Err(DecodeError::ChecksumMismatch { computed, received });
        }

        let header = buf[OFF_HEADER];
        let frame = Self::from_raw(
            (header >> 6) & KIND_MASK,
            (header >> 3) & SEQ_MASK,
            header & SEQ_MASK,
            body[OFF_PAYLOAD..].to_vec(),
        )?;
        Ok(frame)
    }
}

/// Reject payloads the length byte cannot describe.
pub fn check_payload(payload: &[u8]) -> Result<(), FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge(payload.len()));
    }
    Ok(())
}

/// Additive checksum: the sum of all bytes modulo 256.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Reduce an absolute sequence counter to its three-bit wire value.
#[inline]
pub fn wire_seq(abs: u64) -> u8 {
    (abs % u64::from(MAX_SEQ)) as u8
}
