//! Wire format for the coordination protocol.
//!
//! Frame format: `[length:4][payload:length]`
//!
//! - **length**: payload size, big-endian `i32`; must be non-negative and
//!   below the configured maximum
//! - **payload**: a request header plus record on the way out, a reply
//!   header plus record on the way in. The first payload a server sends on a
//!   connection is the [`ConnectResponse`] instead.
//!
//! Records use the protocol's big-endian encoding: `i32`/`i64` integers,
//! one-byte booleans and buffers as an `i32` length followed by the bytes,
//! with a length of `-1` meaning null.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the frame length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum payload length (4 MiB).
///
/// Frames declaring this length or more are rejected before any body byte
/// is buffered.
pub const DEFAULT_MAX_PACKET_LEN: usize = 4 * 1024 * 1024;

/// Reserved transaction ids.
///
/// Replies carrying these are routed without consulting the pending queue.
pub mod xid {
    /// Server-initiated watch notification.
    pub const NOTIFICATION: i32 = -1;
    /// Keepalive ping and its reply.
    pub const PING: i32 = -2;
    /// Authentication request and its reply.
    pub const AUTH: i32 = -4;
    /// Watch re-registration after reconnect.
    pub const SET_WATCHES: i32 = -8;
}

/// Wire format error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// Not enough data to decode a record.
    #[error("insufficient data: need {needed} bytes, have {have}")]
    InsufficientData {
        /// Minimum bytes required.
        needed: usize,
        /// Bytes available.
        have: usize,
    },

    /// A buffer length below `-1`.
    #[error("invalid buffer length: {length}")]
    InvalidBufferLength {
        /// The length read from the wire.
        length: i32,
    },

    /// An operation code outside the catalogue.
    #[error("unknown operation code: {0}")]
    UnknownOpCode(i32),
}

/// Operation codes understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OpCode {
    /// Watch notification.
    Notification = 0,
    /// Create a node.
    Create = 1,
    /// Delete a node.
    Delete = 2,
    /// Check existence of a node.
    Exists = 3,
    /// Read node data.
    GetData = 4,
    /// Write node data.
    SetData = 5,
    /// Read a node's ACL.
    GetAcl = 6,
    /// Write a node's ACL.
    SetAcl = 7,
    /// List children.
    GetChildren = 8,
    /// Flush the leader channel.
    Sync = 9,
    /// Keepalive.
    Ping = 11,
    /// List children with stat.
    GetChildren2 = 12,
    /// Version check inside a multi.
    Check = 13,
    /// Atomic multi-operation.
    Multi = 14,
    /// Add authentication.
    Auth = 100,
    /// Re-register watches.
    SetWatches = 101,
    /// End the session.
    CloseSession = -11,
    /// Error marker inside a multi reply.
    Error = -1,
}

impl OpCode {
    /// The wire value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for OpCode {
    type Error = WireError;

    fn try_from(value: i32) -> Result<Self, WireError> {
        Ok(match value {
            0 => OpCode::Notification,
            1 => OpCode::Create,
            2 => OpCode::Delete,
            3 => OpCode::Exists,
            4 => OpCode::GetData,
            5 => OpCode::SetData,
            6 => OpCode::GetAcl,
            7 => OpCode::SetAcl,
            8 => OpCode::GetChildren,
            9 => OpCode::Sync,
            11 => OpCode::Ping,
            12 => OpCode::GetChildren2,
            13 => OpCode::Check,
            14 => OpCode::Multi,
            100 => OpCode::Auth,
            101 => OpCode::SetWatches,
            -11 => OpCode::CloseSession,
            -1 => OpCode::Error,
            other => return Err(WireError::UnknownOpCode(other)),
        })
    }
}

/// Header preceding every request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Correlation id; zero until assigned at send time.
    pub xid: i32,
    /// Operation.
    pub op: OpCode,
}

impl RequestHeader {
    /// Encoded size.
    pub const SIZE: usize = 8;

    /// Create a header with an unassigned xid.
    pub fn new(op: OpCode) -> Self {
        Self { xid: 0, op }
    }

    /// Header for a keepalive ping.
    pub fn ping() -> Self {
        Self {
            xid: xid::PING,
            op: OpCode::Ping,
        }
    }

    /// Header for an authentication request.
    pub fn auth() -> Self {
        Self {
            xid: xid::AUTH,
            op: OpCode::Auth,
        }
    }

    /// Append the encoded header.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.xid);
        buf.put_i32(self.op.as_i32());
    }

    /// Decode a header from the front of `buf`.
    pub fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        ensure(buf, Self::SIZE)?;
        let xid = buf.get_i32();
        let op = OpCode::try_from(buf.get_i32())?;
        Ok(Self { xid, op })
    }
}

/// Header preceding every reply record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    /// Correlation id of the request, or a reserved xid.
    pub xid: i32,
    /// Last transaction id the server has committed.
    pub zxid: i64,
    /// Server error code; zero on success.
    pub err: i32,
}

impl ReplyHeader {
    /// Encoded size.
    pub const SIZE: usize = 16;

    /// Append the encoded header.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.xid);
        buf.put_i64(self.zxid);
        buf.put_i32(self.err);
    }

    /// Decode a header from the front of `buf`.
    pub fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        ensure(buf, Self::SIZE)?;
        Ok(Self {
            xid: buf.get_i32(),
            zxid: buf.get_i64(),
            err: buf.get_i32(),
        })
    }
}

/// Session handshake sent as the first frame of every connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectRequest {
    /// Protocol version; always zero.
    pub protocol_version: i32,
    /// Highest zxid the client has observed.
    pub last_zxid_seen: i64,
    /// Requested session timeout in milliseconds.
    pub timeout: i32,
    /// Session to resume; zero for a new session.
    pub session_id: i64,
    /// Secret of the session to resume.
    pub password: Bytes,
    /// Whether the client accepts a read-only server.
    pub read_only: bool,
}

impl ConnectRequest {
    /// Append the encoded record.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.protocol_version);
        buf.put_i64(self.last_zxid_seen);
        buf.put_i32(self.timeout);
        buf.put_i64(self.session_id);
        write_buffer(buf, Some(self.password.as_ref()));
        buf.put_u8(u8::from(self.read_only));
    }

    /// Decode a record; the trailing read-only flag is optional.
    pub fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        ensure(buf, 24)?;
        let protocol_version = buf.get_i32();
        let last_zxid_seen = buf.get_i64();
        let timeout = buf.get_i32();
        let session_id = buf.get_i64();
        let password = read_buffer(buf)?.unwrap_or_default();
        let read_only = buf.has_remaining() && buf.get_u8() != 0;
        Ok(Self {
            protocol_version,
            last_zxid_seen,
            timeout,
            session_id,
            password,
            read_only,
        })
    }
}

/// Session handshake reply, the first frame a server sends.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectResponse {
    /// Protocol version.
    pub protocol_version: i32,
    /// Negotiated session timeout in milliseconds; zero means the session
    /// has expired.
    pub timeout: i32,
    /// Assigned or resumed session id.
    pub session_id: i64,
    /// Session secret to present on reconnect.
    pub password: Bytes,
    /// Whether the server is in read-only mode.
    pub read_only: bool,
}

impl ConnectResponse {
    /// Append the encoded record.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.protocol_version);
        buf.put_i32(self.timeout);
        buf.put_i64(self.session_id);
        write_buffer(buf, Some(self.password.as_ref()));
        buf.put_u8(u8::from(self.read_only));
    }

    /// Decode a record.
    ///
    /// Servers predating read-only mode omit the final byte; its absence
    /// reads as `false`.
    pub fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        ensure(buf, 16)?;
        let protocol_version = buf.get_i32();
        let timeout = buf.get_i32();
        let session_id = buf.get_i64();
        let password = read_buffer(buf)?.unwrap_or_default();
        let read_only = buf.has_remaining() && buf.get_u8() != 0;
        Ok(Self {
            protocol_version,
            timeout,
            session_id,
            password,
            read_only,
        })
    }
}

/// Build a complete frame: `[length][header][body]`.
pub fn frame(header: Option<&RequestHeader>, body: &[u8]) -> Bytes {
    let header_len = header.map_or(0, |_| RequestHeader::SIZE);
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + header_len + body.len());
    buf.put_i32(0);
    if let Some(header) = header {
        header.encode(&mut buf);
    }
    buf.put_slice(body);
    let payload_len = (buf.len() - LENGTH_PREFIX_SIZE) as i32;
    buf[..LENGTH_PREFIX_SIZE].copy_from_slice(&payload_len.to_be_bytes());
    buf.freeze()
}

/// Read a length-prefixed buffer; `None` for a null buffer.
pub fn read_buffer(buf: &mut Bytes) -> Result<Option<Bytes>, WireError> {
    ensure(buf, 4)?;
    let length = buf.get_i32();
    if length == -1 {
        return Ok(None);
    }
    if length < -1 {
        return Err(WireError::InvalidBufferLength { length });
    }
    let length = length as usize;
    ensure(buf, length)?;
    Ok(Some(buf.split_to(length)))
}

/// Write a length-prefixed buffer; `None` writes a null buffer.
pub fn write_buffer(buf: &mut BytesMut, data: Option<&[u8]>) {
    match data {
        Some(data) => {
            buf.put_i32(data.len() as i32);
            buf.put_slice(data);
        }
        None => buf.put_i32(-1),
    }
}

fn ensure(buf: &Bytes, needed: usize) -> Result<(), WireError> {
    if buf.remaining() < needed {
        return Err(WireError::InsufficientData {
            needed,
            have: buf.remaining(),
        });
    }
    Ok(())
}
