//! Length-delimited JSON framing over async byte streams
//!
//! Every frame is a 4-byte big-endian length followed by the JSON encoding
//! of a [`Frame`]. Lengths above [`MAX_FRAME_SIZE`] are rejected on both
//! sides so a corrupt prefix cannot trigger a huge allocation.

use crate::{Frame, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Serializes a frame including its length prefix
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    let body = serde_json::to_vec(frame)?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(body.len()));
    }

    let mut data = Vec::with_capacity(4 + body.len());
    data.extend_from_slice(&(body.len() as u32).to_be_bytes());
    data.extend_from_slice(&body);
    Ok(data)
}

pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let data = encode_frame(frame)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next frame
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    if reader.read(&mut len_buf[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut len_buf[1..]).await?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JoinRequest, JOIN_CHANNEL};
    use serde_json::json;

    #[tokio::test]
    async fn test_write_then_read() {
        let frame = Frame::new(JOIN_CHANNEL, &JoinRequest {
            name: "bob".to_string(),
        })
        .unwrap();

        let mut buffer: Vec<u8> = Vec::new();
        write_frame(&mut buffer, &frame).await.unwrap();

        let mut reader = buffer.as_slice();
        let received = read_frame(&mut reader).await.unwrap();
        assert_eq!(received, Some(frame));
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let frame = Frame {
            channel: "command".to_string(),
            payload: json!({"command": {"event": "survey", "survey": "Pick the taboo word"}}),
        };
        let data = encode_frame(&frame).unwrap();
        let (head, tail) = data.split_at(6);

        let mut reader = tokio_test::io::Builder::new().read(head).read(tail).build();
        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(frame));
    }

    #[test]
    fn test_length_prefix() {
        let frame = Frame {
            channel: "text".to_string(),
            payload: json!({"message": "hi", "room": null}),
        };
        let data = encode_frame(&frame).unwrap();
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        assert_eq!(len, data.len() - 4);
    }

    #[tokio::test]
    async fn test_oversized_prefix_rejected() {
        let data = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes();
        let mut reader = &data[..];
        let result = read_frame(&mut reader).await;
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge(_))));
    }

    #[tokio::test]
    async fn test_truncated_prefix_is_error() {
        let mut reader = tokio_test::io::Builder::new().read(&[0, 0]).build();
        let result = read_frame(&mut reader).await;
        assert!(matches!(result, Err(ProtocolError::Io(_))));
    }

    #[tokio::test]
    async fn test_truncated_body_is_error() {
        let frame = Frame {
            channel: "command".to_string(),
            payload: json!({"command": {"event": "survey", "survey": "x"}}),
        };
        let data = encode_frame(&frame).unwrap();
        let mut reader = &data[..data.len() - 3];
        let result = read_frame(&mut reader).await;
        assert!(matches!(result, Err(ProtocolError::Io(_))));
    }
}
