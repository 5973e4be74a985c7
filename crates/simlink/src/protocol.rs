// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native message layouts.
//!
//! Every message starts with a 12-byte header (`size`, `version`, `kind`,
//! all little-endian `u32`) followed by a kind-specific body. Layouts are
//! fixed per kind; nothing is inferred from payload contents.
//!
//! ```text
//! Exception         header | exception | send_id | index
//! SimObjectData     header | request_id | object_id | define_id | flags
//!                          | entry_number | out_of | define_count | payload...
//! AssignedObjectId  header | request_id | object_id
//! ```

use crate::native::SendId;
use crate::{DefinitionId, ObjectId, RequestId};
use thiserror::Error;

/// Common header size.
pub const HEADER_SIZE: usize = 12;
/// Offset of the payload in a SimObjectData message.
pub const SIM_OBJECT_DATA_HEADER_SIZE: usize = HEADER_SIZE + 7 * 4;
/// Protocol version written by the encoders.
pub const PROTOCOL_VERSION: u32 = 4;

const EXCEPTION_SIZE: usize = HEADER_SIZE + 3 * 4;
const ASSIGNED_OBJECT_ID_SIZE: usize = HEADER_SIZE + 2 * 4;

/// Malformed message errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("message truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("header declares {declared} bytes but {actual} were received")]
    SizeMismatch { declared: usize, actual: usize },
}

/// Message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Null,
    Exception,
    Open,
    Quit,
    SimObjectData,
    AssignedObjectId,
    Unrecognized(u32),
}

impl MessageKind {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Null,
            1 => Self::Exception,
            2 => Self::Open,
            3 => Self::Quit,
            8 => Self::SimObjectData,
            12 => Self::AssignedObjectId,
            other => Self::Unrecognized(other),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::Null => 0,
            Self::Exception => 1,
            Self::Open => 2,
            Self::Quit => 3,
            Self::SimObjectData => 8,
            Self::AssignedObjectId => 12,
            Self::Unrecognized(other) => other,
        }
    }
}

/// Common message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub size: u32,
    pub version: u32,
    pub kind: MessageKind,
}

/// Exception response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionBody {
    pub exception: u32,
    pub send_id: SendId,
    /// Index of the offending parameter, when the simulator reports one.
    pub index: u32,
}

/// Value response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimObjectData<'a> {
    pub request: RequestId,
    pub object: ObjectId,
    pub definition: DefinitionId,
    pub flags: u32,
    pub entry_number: u32,
    pub out_of: u32,
    pub define_count: u32,
    pub payload: &'a [u8],
}

/// A parsed message borrowing from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    Null,
    Open,
    Quit,
    Exception(ExceptionBody),
    SimObjectData(SimObjectData<'a>),
    AssignedObjectId { request: RequestId, object: ObjectId },
    Unrecognized(u32),
}

struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        let end = self.offset + 4;
        let bytes = self.buf.get(self.offset..end).ok_or(ProtocolError::Truncated {
            need: end,
            have: self.buf.len(),
        })?;
        self.offset = end;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.offset..]
    }
}

impl MessageHeader {
    /// Decode the header only.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = Reader::new(buf);
        let size = reader.u32()?;
        let version = reader.u32()?;
        let kind = MessageKind::from_u32(reader.u32()?);
        Ok(Self {
            size,
            version,
            kind,
        })
    }
}

impl<'a> Message<'a> {
    /// Parse one message. Bytes past the declared size are ignored.
    pub fn parse(buf: &'a [u8]) -> Result<(MessageHeader, Message<'a>), ProtocolError> {
        let header = MessageHeader::decode(buf)?;
        let declared = header.size as usize;
        if declared < HEADER_SIZE || declared > buf.len() {
            return Err(ProtocolError::SizeMismatch {
                declared,
                actual: buf.len(),
            });
        }

        let mut reader = Reader::new(&buf[..declared]);
        reader.offset = HEADER_SIZE;

        let message = match header.kind {
            MessageKind::Null => Message::Null,
            MessageKind::Open => Message::Open,
            MessageKind::Quit => Message::Quit,
            MessageKind::Exception => Message::Exception(ExceptionBody {
                exception: reader.u32()?,
                send_id: SendId(reader.u32()?),
                index: reader.u32()?,
            }),
            MessageKind::SimObjectData => {
                let request = RequestId(reader.u32()?);
                let object = ObjectId(reader.u32()?);
                let definition = DefinitionId(reader.u32()?);
                let flags = reader.u32()?;
                let entry_number = reader.u32()?;
                let out_of = reader.u32()?;
                let define_count = reader.u32()?;
                Message::SimObjectData(SimObjectData {
                    request,
                    object,
                    definition,
                    flags,
                    entry_number,
                    out_of,
                    define_count,
                    payload: reader.rest(),
                })
            }
            MessageKind::AssignedObjectId => Message::AssignedObjectId {
                request: RequestId(reader.u32()?),
                object: ObjectId(reader.u32()?),
            },
            MessageKind::Unrecognized(kind) => Message::Unrecognized(kind),
        };
        Ok((header, message))
    }
}

/// Request ID of a reply that failed to parse, when it is still readable.
///
/// Only kinds that carry a request ID at the start of their body qualify.
pub fn salvage_request(buf: &[u8]) -> Option<(MessageKind, RequestId)> {
    let header = MessageHeader::decode(buf).ok()?;
    match header.kind {
        MessageKind::SimObjectData | MessageKind::AssignedObjectId => {}
        _ => return None,
    }
    let end = (header.size as usize).min(buf.len());
    let mut reader = Reader::new(buf.get(..end)?);
    reader.offset = HEADER_SIZE;
    let request = RequestId(reader.u32().ok()?);
    Some((header.kind, request))
}

// ============================================================================
// Encoders (mock service, tests, fuzz corpus)
// ============================================================================

fn start(kind: MessageKind, size: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(size);
    buf.extend_from_slice(&(size as u32).to_le_bytes());
    buf.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    buf.extend_from_slice(&kind.as_u32().to_le_bytes());
    buf
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Header-only message of `kind`.
pub fn encode_empty(kind: MessageKind) -> Vec<u8> {
    start(kind, HEADER_SIZE)
}

/// Exception response.
pub fn encode_exception(exception: u32, send_id: SendId, index: u32) -> Vec<u8> {
    let mut buf = start(MessageKind::Exception, EXCEPTION_SIZE);
    push_u32(&mut buf, exception);
    push_u32(&mut buf, send_id.0);
    push_u32(&mut buf, index);
    buf
}

/// Single-entry value response.
pub fn encode_sim_object_data(
    request: RequestId,
    object: ObjectId,
    definition: DefinitionId,
    payload: &[u8],
) -> Vec<u8> {
    let size = SIM_OBJECT_DATA_HEADER_SIZE + payload.len();
    let mut buf = start(MessageKind::SimObjectData, size);
    push_u32(&mut buf, request.0);
    push_u32(&mut buf, object.0);
    push_u32(&mut buf, definition.0);
    push_u32(&mut buf, 0); // flags
    push_u32(&mut buf, 1); // entry_number
    push_u32(&mut buf, 1); // out_of
    push_u32(&mut buf, 1); // define_count
    buf.extend_from_slice(payload);
    buf
}

/// Object-creation acknowledgement.
pub fn encode_assigned_object_id(request: RequestId, object: ObjectId) -> Vec<u8> {
    let mut buf = start(MessageKind::AssignedObjectId, ASSIGNED_OBJECT_ID_SIZE);
    push_u32(&mut buf, request.0);
    push_u32(&mut buf, object.0);
    buf
}
