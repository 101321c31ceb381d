//! Binary codec for P-Chain transactions and UTXOs
//!
//! Layout follows avalanchego's linear codec: a 2-byte codec version, then
//! fields in declaration order. Integers are big-endian, fixed-size arrays
//! are written raw, byte slices and lists carry a `u32` length, strings a
//! `u16` length, and interface values are prefixed by a `u32` type id.

use thiserror::Error;

use super::ids::{Id, NodeId, ShortId, ID_LEN};

pub const CODEC_VERSION: u16 = 0;

/// Upper bound on any length prefix accepted while decoding
const MAX_SLICE_LEN: usize = 1 << 20;

/// Registered type ids of the P-Chain codec
pub mod type_id {
    pub const TRANSFER_INPUT: u32 = 5;
    pub const TRANSFER_OUTPUT: u32 = 7;
    pub const CREDENTIAL: u32 = 9;
    pub const SUBNET_AUTH: u32 = 10;
    pub const OUTPUT_OWNERS: u32 = 11;
    pub const ADD_VALIDATOR_TX: u32 = 12;
    pub const ADD_SUBNET_VALIDATOR_TX: u32 = 13;
    pub const CREATE_CHAIN_TX: u32 = 15;
    pub const CREATE_SUBNET_TX: u32 = 16;
    pub const STAKEABLE_LOCK_IN: u32 = 21;
    pub const STAKEABLE_LOCK_OUT: u32 = 22;
    pub const REMOVE_SUBNET_VALIDATOR_TX: u32 = 23;
    pub const TRANSFER_SUBNET_OWNERSHIP_TX: u32 = 33;
    pub const CONVERT_SUBNET_TO_L1_TX: u32 = 35;
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Payload truncated: needed {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("Unsupported codec version {0}")]
    UnsupportedVersion(u16),
    #[error("Unexpected type id {found} for {what}")]
    UnexpectedType { what: &'static str, found: u32 },
    #[error("Length {0} exceeds codec limit")]
    TooLong(usize),
    #[error("String is not UTF-8")]
    InvalidString,
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}

/// Appends codec fields to a byte buffer
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Writer that starts with the codec version
    pub fn versioned() -> Self {
        let mut writer = Self::default();
        writer.u16(CODEC_VERSION);
        writer
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Fixed-size bytes, no length prefix
    pub fn fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn id(&mut self, id: &Id) {
        self.fixed(&id.to_vec());
    }

    pub fn short_id(&mut self, id: &ShortId) {
        self.fixed(&id.as_ref().to_vec());
    }

    pub fn node_id(&mut self, id: &NodeId) {
        self.fixed(&id.to_vec());
    }

    /// `u32` length followed by the bytes
    pub fn bytes(&mut self, bytes: &[u8]) {
        self.count(bytes.len());
        self.fixed(bytes);
    }

    /// `u16` length followed by UTF-8
    pub fn str(&mut self, s: &str) {
        self.u16(s.len() as u16);
        self.fixed(s.as_bytes());
    }

    /// `u32` element count of a list or byte slice
    pub fn count(&mut self, len: usize) {
        self.u32(len as u32);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads codec fields from a byte slice
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Reader positioned after a checked codec version
    pub fn versioned(bytes: &'a [u8]) -> Result<Self, CodecError> {
        let mut reader = Self::new(bytes);
        let version = reader.u16()?;
        if version != CODEC_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        Ok(reader)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.bytes.len() - self.offset;
        if n > remaining {
            return Err(CodecError::Truncated {
                offset: self.offset,
                needed: n - remaining,
            });
        }
        let out = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub fn fixed(&mut self, n: usize) -> Result<Vec<u8>, CodecError> {
        Ok(self.take(n)?.to_vec())
    }

    pub fn id(&mut self) -> Result<Id, CodecError> {
        Ok(Id::from_slice(self.take(ID_LEN)?))
    }

    pub fn short_id(&mut self) -> Result<ShortId, CodecError> {
        Ok(ShortId::from_slice(self.take(20)?))
    }

    pub fn node_id(&mut self) -> Result<NodeId, CodecError> {
        Ok(NodeId::from_slice(self.take(20)?))
    }

    pub fn count(&mut self) -> Result<usize, CodecError> {
        let len = self.u32()? as usize;
        if len > MAX_SLICE_LEN {
            return Err(CodecError::TooLong(len));
        }
        Ok(len)
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.count()?;
        self.fixed(len)
    }

    pub fn str(&mut self) -> Result<String, CodecError> {
        let len = self.u16()? as usize;
        String::from_utf8(self.fixed(len)?).map_err(|_| CodecError::InvalidString)
    }

    /// Read a type id and check it is `expected`
    pub fn expect_type(&mut self, what: &'static str, expected: u32) -> Result<(), CodecError> {
        let found = self.u32()?;
        if found != expected {
            return Err(CodecError::UnexpectedType { what, found });
        }
        Ok(())
    }

    /// Fail unless every byte has been consumed
    pub fn finish(self) -> Result<(), CodecError> {
        let left = self.bytes.len() - self.offset;
        if left > 0 {
            return Err(CodecError::TrailingBytes(left));
        }
        Ok(())
    }
}
