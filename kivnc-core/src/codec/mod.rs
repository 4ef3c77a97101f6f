//! Length-prefixed framing shared by the data and control connections.
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────┐
//! │ length: u32 (BE)     │ payload: `length` bytes  │
//! └──────────────────────┴──────────────────────────┘
//! ```
//!
//! TCP has no message boundaries, so both the codec and the free
//! helpers accumulate partial reads until a whole frame is present.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Error, Result};

/// Width of the length header in bytes.
pub const HEADER_LENGTH: usize = 4;

/// Codec for `[u32 length][payload]` frames, usable with
/// `tokio_util::codec::Framed`.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    max_length: Option<usize>,
}

impl FrameCodec {
    /// A codec that accepts frames of any length.
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec that rejects frames announcing more than `max` bytes.
    pub fn with_max_length(max: usize) -> Self {
        Self {
            max_length: Some(max),
        }
    }

    /// The configured limit, if any.
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    fn check_length(&self, size: usize) -> Result<()> {
        match self.max_length {
            Some(max) if size > max => Err(Error::FrameTooLarge { size, max }),
            _ if size > u32::MAX as usize => Err(Error::FrameTooLarge {
                size,
                max: u32::MAX as usize,
            }),
            _ => Ok(()),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < HEADER_LENGTH {
            src.reserve(HEADER_LENGTH - src.len());
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LENGTH];
        header.copy_from_slice(&src[..HEADER_LENGTH]);
        let length = u32::from_be_bytes(header) as usize;
        self.check_length(length)?;

        if src.len() < HEADER_LENGTH + length {
            src.reserve(HEADER_LENGTH + length - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LENGTH);
        Ok(Some(src.split_to(length)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        self.check_length(item.len())?;
        dst.reserve(HEADER_LENGTH + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(HEADER_LENGTH + payload.len());
    FrameCodec::new().encode(Bytes::copy_from_slice(payload), &mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame, looping over short reads.
///
/// Returns [`Error::ConnectionClosed`] if the stream ends before any
/// header byte arrives, and [`Error::Connection`] if it ends mid-frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LENGTH];
    let mut filled = 0;
    while filled < HEADER_LENGTH {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return Err(if filled == 0 {
                Error::ConnectionClosed
            } else {
                std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into()
            });
        }
        filled += n;
    }

    let mut payload = vec![0u8; u32::from_be_bytes(header) as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    #[test]
    fn encode_prefixes_big_endian_length() {
        let mut codec = FrameCodec::new();
        let mut dst = BytesMut::new();
        codec.encode(Bytes::from_static(b"abc"), &mut dst).unwrap();
        assert_eq!(&dst[..], &[0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn decode_waits_for_full_frame() {
        let mut codec = FrameCodec::new();
        let mut src = BytesMut::from(&[0u8, 0, 0][..]);
        assert!(codec.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(&[5, b'h', b'e']);
        assert!(codec.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(b"llo!");
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(&frame[..], b"hello");
        // Trailing byte belongs to the next frame.
        assert_eq!(&src[..], b"!");
    }

    #[test]
    fn decode_rejects_oversized_header() {
        let mut codec = FrameCodec::with_max_length(8);
        let mut src = BytesMut::from(&[0u8, 0, 0, 9][..]);
        let err = codec.decode(&mut src).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { size: 9, max: 8 }));
    }

    #[test]
    fn empty_payload_is_a_frame() {
        let mut codec = FrameCodec::new();
        let mut src = BytesMut::from(&[0u8, 0, 0, 0][..]);
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert!(frame.is_empty());
        assert!(src.is_empty());
    }

    #[tokio::test]
    async fn one_byte_deliveries_reassemble() {
        let payload = b"fragmented";
        let mut wire = (payload.len() as u32).to_be_bytes().to_vec();
        wire.extend_from_slice(payload);

        let mut builder = tokio_test::io::Builder::new();
        for byte in &wire {
            builder.read(std::slice::from_ref(byte));
        }
        let mut framed = FramedRead::new(builder.build(), FrameCodec::new());

        let frame = framed.next().await.unwrap().unwrap();
        assert_eq!(&frame[..], payload);
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn helpers_survive_one_byte_pipe() {
        // A duplex pipe with a 1-byte buffer forces every read and write
        // to be split into single bytes.
        let (mut a, mut b) = tokio::io::duplex(1);
        let payloads: Vec<Vec<u8>> = vec![vec![], vec![7], (0..=255).collect(), vec![0xAB; 1500]];

        let expected = payloads.clone();
        let writer = tokio::spawn(async move {
            for p in &payloads {
                write_frame(&mut a, p).await.unwrap();
            }
        });

        for want in expected {
            assert_eq!(read_frame(&mut b).await.unwrap(), want);
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn codec_and_helpers_agree() {
        let (a, mut b) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(a, FrameCodec::new());
        sink.send(Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(read_frame(&mut b).await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn clean_close_vs_truncated_frame() {
        let mock = tokio_test::io::Builder::new().build();
        let mut reader = mock;
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(Error::ConnectionClosed)
        ));

        let mut truncated = tokio_test::io::Builder::new()
            .read(&[0, 0, 0, 4, b'x'])
            .build();
        assert!(matches!(
            read_frame(&mut truncated).await,
            Err(Error::Connection(_))
        ));

        let truncated = tokio_test::io::Builder::new().read(&[0, 0]).build();
        let mut framed = FramedRead::new(truncated, FrameCodec::new());
        assert!(matches!(framed.next().await, Some(Err(Error::Connection(_)))));
    }
}
