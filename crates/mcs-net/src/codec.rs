//! ---
//! mcs_section: "05-networking-external-interfaces"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Network connectivity to the managed game server."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
//! Framing primitives for the Java edition protocol: VarInt integers,
//! length-prefixed strings and length-prefixed packets.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{ProbeError, Result};

/// Largest packet accepted from a server.
pub const MAX_FRAME_LEN: usize = 1 << 20;

const VARINT_MAX_BYTES: usize = 5;

pub fn put_varint(buf: &mut BytesMut, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.put_u8(value as u8);
            return;
        }
        buf.put_u8(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
}

pub fn get_varint(buf: &mut impl Buf) -> Result<i32> {
    let mut result: u32 = 0;
    for position in 0..VARINT_MAX_BYTES {
        if !buf.has_remaining() {
            return Err(ProbeError::Protocol("truncated varint".into()));
        }
        let byte = buf.get_u8();
        result |= u32::from(byte & 0x7F) << (7 * position);
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    Err(ProbeError::Protocol("varint longer than 5 bytes".into()))
}

pub fn put_string(buf: &mut BytesMut, value: &str) {
    put_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

pub fn get_string(buf: &mut impl Buf) -> Result<String> {
    let len = get_varint(buf)?;
    let len = usize::try_from(len)
        .map_err(|_| ProbeError::Protocol(format!("negative string length {len}")))?;
    if len > buf.remaining() {
        return Err(ProbeError::Protocol(format!(
            "string length {len} exceeds remaining {} bytes",
            buf.remaining()
        )));
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec())
        .map_err(|err| ProbeError::Protocol(format!("string is not utf-8: {err}")))
}

/// Wrap a packet body with its id and length prefix.
pub fn frame(packet_id: i32, body: &[u8]) -> BytesMut {
    let mut payload = BytesMut::with_capacity(body.len() + VARINT_MAX_BYTES);
    put_varint(&mut payload, packet_id);
    payload.extend_from_slice(body);

    let mut framed = BytesMut::with_capacity(payload.len() + VARINT_MAX_BYTES);
    put_varint(&mut framed, payload.len() as i32);
    framed.extend_from_slice(&payload);
    framed
}

/// Handshake packet announcing the protocol version and the intended next state.
pub fn handshake(protocol_version: i32, host: &str, port: u16, next_state: i32) -> BytesMut {
    let mut body = BytesMut::new();
    put_varint(&mut body, protocol_version);
    put_string(&mut body, host);
    body.put_u16(port);
    put_varint(&mut body, next_state);
    frame(0x00, &body)
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32> {
    let mut result: u32 = 0;
    for position in 0..VARINT_MAX_BYTES {
        let byte = reader.read_u8().await?;
        result |= u32::from(byte & 0x7F) << (7 * position);
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    Err(ProbeError::Protocol("frame length varint too long".into()))
}

/// Read one length-prefixed packet (id included) from the stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Bytes> {
    let len = read_varint(reader).await?;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| (1..=MAX_FRAME_LEN).contains(len))
        .ok_or_else(|| ProbeError::Protocol(format!("invalid frame length {len}")))?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_known_encodings() {
        let cases: [(i32, &[u8]); 5] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (25565, &[0xdd, 0xc7, 0x01]),
            (-1, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
        ];
        for (value, expected) in cases {
            let mut buf = BytesMut::new();
            put_varint(&mut buf, value);
            assert_eq!(&buf[..], expected, "encoding {value}");
            let mut read = buf.freeze();
            assert_eq!(get_varint(&mut read).unwrap(), value);
        }
    }

    #[test]
    fn overlong_varint_is_rejected() {
        let mut buf = Bytes::from_static(&[0xff, 0xff, 0xff, 0xff, 0xff, 0x01]);
        assert!(matches!(
            get_varint(&mut buf),
            Err(ProbeError::Protocol(_))
        ));
    }

    #[test]
    fn string_length_beyond_buffer_is_rejected() {
        let mut buf = BytesMut::new();
        put_varint(&mut buf, 10);
        buf.extend_from_slice(b"abc");
        let mut read = buf.freeze();
        assert!(get_string(&mut read).is_err());
    }

    #[test]
    fn handshake_layout() {
        let packet = handshake(47, "localhost", 25565, 1);
        let mut read = packet.freeze();
        let len = get_varint(&mut read).unwrap() as usize;
        assert_eq!(len, read.remaining());
        assert_eq!(get_varint(&mut read).unwrap(), 0x00);
        assert_eq!(get_varint(&mut read).unwrap(), 47);
        assert_eq!(get_string(&mut read).unwrap(), "localhost");
        assert_eq!(read.get_u16(), 25565);
        assert_eq!(get_varint(&mut read).unwrap(), 1);
        assert!(!read.has_remaining());
    }

    #[tokio::test]
    async fn read_frame_returns_payload_after_length() {
        let packet = frame(0x00, b"{}");
        let mut reader: &[u8] = &packet;
        let payload = read_frame(&mut reader).await.unwrap();
        assert_eq!(&payload[..], &[0x00, b'{', b'}']);
    }
}
