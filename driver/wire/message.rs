/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! `OP_MSG` framing: a 16-byte header, a flags word and a single body section.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    bson::{Document, RawDocumentBuf},
    error::DriverError,
};

pub const OP_MSG: i32 = 2013;
pub const HEADER_LENGTH: usize = 16;
pub const MAX_MESSAGE_LENGTH: usize = 48_000_000;

const CHECKSUM_PRESENT: u32 = 1;
const BODY_SECTION: u8 = 0;
const DOCUMENT_SEQUENCE_SECTION: u8 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct OpMsg {
    pub request_id: i32,
    pub response_to: i32,
    pub body: RawDocumentBuf,
}

impl OpMsg {
    pub fn new(request_id: i32, response_to: i32, body: &Document) -> Result<Self, DriverError> {
        let body = RawDocumentBuf::from_document(body)
            .map_err(|err| DriverError::Protocol { details: format!("cannot encode command: {err}") })?;
        Ok(Self { request_id, response_to, body })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let body = self.body.as_bytes();
        let length = HEADER_LENGTH + 4 + 1 + body.len();
        let mut bytes = Vec::with_capacity(length);
        bytes.extend_from_slice(&(length as i32).to_le_bytes());
        bytes.extend_from_slice(&self.request_id.to_le_bytes());
        bytes.extend_from_slice(&self.response_to.to_le_bytes());
        bytes.extend_from_slice(&OP_MSG.to_le_bytes());
        bytes.extend_from_slice(&0_u32.to_le_bytes());
        bytes.push(BODY_SECTION);
        bytes.extend_from_slice(body);
        bytes
    }

    pub fn document(&self) -> Result<Document, DriverError> {
        self.body.to_document().map_err(|err| DriverError::Protocol { details: format!("cannot decode body: {err}") })
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<(), DriverError> {
        writer.write_all(&self.to_bytes()).await.map_err(DriverError::io)?;
        writer.flush().await.map_err(DriverError::io)
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, DriverError> {
        let mut header = [0_u8; HEADER_LENGTH];
        reader.read_exact(&mut header).await.map_err(DriverError::io)?;
        let length = read_i32(&header[0..4])?;
        let request_id = read_i32(&header[4..8])?;
        let response_to = read_i32(&header[8..12])?;
        let op_code = read_i32(&header[12..16])?;
        if op_code != OP_MSG {
            return Err(DriverError::Protocol { details: format!("expected opcode {OP_MSG}, found {op_code}") });
        }
        let length = usize::try_from(length)
            .ok()
            .filter(|length| (HEADER_LENGTH + 5..=MAX_MESSAGE_LENGTH).contains(length))
            .ok_or_else(|| DriverError::Protocol { details: format!("message length {length} out of bounds") })?;

        let mut payload = vec![0_u8; length - HEADER_LENGTH];
        reader.read_exact(&mut payload).await.map_err(DriverError::io)?;
        let flags = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let sections_end = if flags & CHECKSUM_PRESENT != 0 { payload.len().saturating_sub(4) } else { payload.len() };
        let sections = payload
            .get(4..sections_end)
            .ok_or_else(|| DriverError::Protocol { details: "checksum without sections".to_owned() })?;
        let body = read_body_section(sections)?;
        Ok(Self { request_id, response_to, body })
    }
}

fn read_body_section(mut sections: &[u8]) -> Result<RawDocumentBuf, DriverError> {
    let mut body = None;
    while let Some((&kind, rest)) = sections.split_first() {
        let size = usize::try_from(read_i32(rest)?)
            .ok()
            .filter(|size| *size >= 4 && *size <= rest.len())
            .ok_or_else(|| DriverError::Protocol { details: "section length out of bounds".to_owned() })?;
        match kind {
            BODY_SECTION => {
                let document = RawDocumentBuf::from_bytes(rest[..size].to_vec())
                    .map_err(|err| DriverError::Protocol { details: format!("malformed body section: {err}") })?;
                body = Some(document);
            }
            DOCUMENT_SEQUENCE_SECTION => (),
            other => return Err(DriverError::Protocol { details: format!("unknown section kind {other}") }),
        }
        sections = &rest[size..];
    }
    body.ok_or_else(|| DriverError::Protocol { details: "message without a body section".to_owned() })
}

fn read_i32(bytes: &[u8]) -> Result<i32, DriverError> {
    match bytes {
        [a, b, c, d, ..] => Ok(i32::from_le_bytes([*a, *b, *c, *d])),
        _ => Err(DriverError::Protocol { details: "truncated message".to_owned() }),
    }
}
