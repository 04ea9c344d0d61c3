use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use super::opcodes::{OP_COMMAND, OP_COMMANDREPLY};
use crate::bson::Document;
use crate::error::{MdbError, MdbResult};

pub(crate) const HEADER_LEN: usize = 16;

/// The 16-byte header every wire message starts with: total message
/// length (including this header), request id, the request id this
/// message answers (0 for requests), and the opcode.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MessageHeader {
    pub total_len: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: i32,
}

impl MessageHeader {
    fn write(self, buf: &mut Vec<u8>) -> MdbResult<()> {
        buf.write_i32::<LittleEndian>(self.total_len)?;
        buf.write_i32::<LittleEndian>(self.request_id)?;
        buf.write_i32::<LittleEndian>(self.response_to)?;
        buf.write_i32::<LittleEndian>(self.op_code)?;
        Ok(())
    }

    fn read(bytes: &[u8; HEADER_LEN]) -> MdbResult<Self> {
        let mut cursor = &bytes[..];
        Ok(Self {
            total_len: cursor.read_i32::<LittleEndian>()?,
            request_id: cursor.read_i32::<LittleEndian>()?,
            response_to: cursor.read_i32::<LittleEndian>()?,
            op_code: cursor.read_i32::<LittleEndian>()?,
        })
    }
}

fn write_cstring(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0x00);
}

/// Packs an `OP_COMMAND` message: `cstring db || cstring commandName
/// || bson commandArgs || bson inputDocs`. `inputDocs` is always
/// empty; this protocol generation never sends attached input
/// documents.
pub(crate) fn pack_op_command(
    request_id: i32,
    database: &str,
    command_name: &str,
    command_args: &Document,
) -> MdbResult<Vec<u8>> {
    let mut body = Vec::new();
    write_cstring(&mut body, database);
    write_cstring(&mut body, command_name);
    body.extend_from_slice(&command_args.encode_with_first_key(Some(command_name))?);
    body.extend_from_slice(&Document::new().encode()?);

    let header = MessageHeader {
        total_len: i32::try_from(HEADER_LEN + body.len())
            .map_err(|_| MdbError::encode("message too large to encode"))?,
        request_id,
        response_to: 0,
        op_code: OP_COMMAND,
    };
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    header.write(&mut out)?;
    out.extend_from_slice(&body);
    Ok(out)
}

/// Writes the full message, looping over partial writes the way a
/// blocking socket can produce.
pub(crate) fn write_message(stream: &mut impl Write, bytes: &[u8]) -> MdbResult<()> {
    stream.write_all(bytes)?;
    Ok(())
}

/// Reads exactly one framed message: the 16-byte header, then
/// `total_len - 16` body bytes. A stream that closes mid-message
/// yields `MdbError::Protocol`.
pub(crate) fn read_message(stream: &mut impl Read) -> MdbResult<(MessageHeader, Vec<u8>)> {
    let mut header_bytes = [0_u8; HEADER_LEN];
    stream
        .read_exact(&mut header_bytes)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                MdbError::protocol("connection closed while reading message header")
            }
            _ => MdbError::Connect { source: e },
        })?;
    let header = MessageHeader::read(&header_bytes)?;

    let body_len = usize::try_from(header.total_len)
        .ok()
        .and_then(|n| n.checked_sub(HEADER_LEN))
        .ok_or_else(|| MdbError::protocol("message length is smaller than the header"))?;

    let mut body = vec![0_u8; body_len];
    stream.read_exact(&mut body).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            MdbError::protocol("connection closed while reading a truncated message body")
        }
        _ => MdbError::Connect { source: e },
    })?;

    Ok((header, body))
}

/// Parses an `OP_COMMANDREPLY` body: `bson commandReply || bson
/// metadata || bson outputDocs`. The command reply is the first
/// document in the body; whatever follows it is not interpreted.
pub(crate) fn parse_op_commandreply(header: &MessageHeader, body: &[u8]) -> MdbResult<Document> {
    if header.op_code != OP_COMMANDREPLY {
        return Err(MdbError::protocol(format!(
            "expected OP_COMMANDREPLY (2011), got opcode {}",
            header.op_code
        )));
    }
    let (command_reply, _rest) = Document::decode(body)?;
    Ok(command_reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn packs_op_command_with_hoisted_name_first() {
        let args = doc! {"findAndModify" => "pets", "query" => doc!{}};
        let msg = pack_op_command(7, "test", "findAndModify", &args).unwrap();
        let header = MessageHeader::read(&msg[..16].try_into().unwrap()).unwrap();
        assert_eq!(header.op_code, OP_COMMAND);
        assert_eq!(header.request_id, 7);
        assert_eq!(header.total_len as usize, msg.len());
    }

    #[test]
    fn round_trips_commandreply_body() {
        let mut reply = doc! {"ok" => 1.0_f64, "n" => 3_i32};
        reply.insert("errmsg", "");
        let mut body = Vec::new();
        body.extend_from_slice(&reply.encode().unwrap());
        body.extend_from_slice(&Document::new().encode().unwrap());
        body.extend_from_slice(&Document::new().encode().unwrap());

        let header = MessageHeader {
            total_len: i32::try_from(HEADER_LEN + body.len()).unwrap(),
            request_id: 0,
            response_to: 7,
            op_code: OP_COMMANDREPLY,
        };
        let decoded = parse_op_commandreply(&header, &body).unwrap();
        assert_eq!(decoded.get_f64("ok"), Some(1.0));
        assert_eq!(decoded.get_f64("n"), Some(3.0));
    }

    #[test]
    fn rejects_wrong_opcode_in_reply() {
        let header = MessageHeader {
            total_len: 16,
            request_id: 0,
            response_to: 0,
            op_code: super::super::opcodes::OP_QUERY,
        };
        assert!(parse_op_commandreply(&header, &[]).is_err());
    }

    #[test]
    fn read_message_reports_truncation() {
        let mut bytes: &[u8] = &[16, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(read_message(&mut bytes).is_err());
    }
}
