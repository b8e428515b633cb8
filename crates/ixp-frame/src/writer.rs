use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_frame, Frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// Expects a blocking stream: `WouldBlock` is retried at once, with no wait.
/// Not synchronised either, so give each stream exactly one writer.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.type_code, frame.tag, frame.body.as_ref())
    }

    /// Check that a body of `len` bytes fits in a frame, without writing.
    pub fn check_body_len(&self, len: usize) -> Result<()> {
        let size = HEADER_SIZE.saturating_add(len);
        if size > self.config.max_frame_size || size > u32::MAX as usize {
            return Err(FrameError::FrameTooLarge {
                size,
                max: self.config.max_frame_size.min(u32::MAX as usize),
            });
        }
        Ok(())
    }

    /// Frame and send a body, then flush.
    ///
    /// The whole frame is encoded before the first byte is written, so an
    /// oversized body never leaves a partial header on the stream.
    pub fn send(&mut self, type_code: u8, tag: u16, body: &[u8]) -> Result<()> {
        self.check_body_len(body.len())?;

        self.buf.clear();
        encode_frame(type_code, tag, body, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if retryable(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        trace!(type_code, tag, size = offset, "frame written");
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if retryable(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }
}

fn retryable(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock)
}

#[cfg(test)]
mod tests {
    use std::io;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::decode_frame;

    /// Accepts at most `limit` bytes per write, failing once with each
    /// queued error kind first.
    #[derive(Default)]
    struct Trickle {
        limit: usize,
        failures: Vec<ErrorKind>,
        wire: Vec<u8>,
        writes: usize,
        flushes: usize,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.failures.pop() {
                return Err(io::Error::from(kind));
            }
            self.writes += 1;
            let n = buf.len().min(self.limit);
            self.wire.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn header_only_frame_layout() {
        let mut wire = Vec::new();
        FrameWriter::new(&mut wire).send(109, 3, b"").unwrap();
        assert_eq!(wire, [7, 0, 0, 0, 109, 3, 0]);
    }

    #[test]
    fn tversion_with_sentinel_tag() {
        let mut wire = Vec::new();
        FrameWriter::new(&mut wire)
            .send(100, 0xFFFF, b"\x00\x20\x00\x00\x06\x009P2000")
            .unwrap();
        assert_eq!(
            wire,
            b"\x13\x00\x00\x00\x64\xff\xff\x00\x20\x00\x00\x06\x009P2000"
        );
    }

    #[test]
    fn body_limit_is_inclusive_and_checked_before_writing() {
        let cfg = FrameConfig {
            max_frame_size: HEADER_SIZE + 4,
        };
        let mut wire = Vec::new();
        let mut writer = FrameWriter::with_config(&mut wire, cfg);

        assert!(writer.check_body_len(4).is_ok());
        assert!(matches!(
            writer.check_body_len(5),
            Err(FrameError::FrameTooLarge { size: 12, max: 11 })
        ));

        writer.send(118, 1, b"four").unwrap();
        assert!(writer.send(118, 2, b"fives").is_err());
        drop(writer);
        assert_eq!(wire.len(), HEADER_SIZE + 4);
    }

    #[test]
    fn short_writes_are_completed_and_flushed() {
        let mut sink = Trickle {
            limit: 3,
            ..Default::default()
        };
        let mut writer = FrameWriter::new(&mut sink);
        writer.send(116, 0x0102, b"offset+count").unwrap();
        writer.send(116, 0x0103, b"").unwrap();
        drop(writer);

        assert_eq!(sink.flushes, 2);
        assert_eq!(sink.writes, (HEADER_SIZE + 12).div_ceil(3) + HEADER_SIZE.div_ceil(3));

        let mut wire = BytesMut::from(sink.wire.as_slice());
        let first = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!((first.tag, first.body.as_ref()), (0x0102, b"offset+count".as_ref()));
        let second = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(second.tag, 0x0103);
        assert!(wire.is_empty());
    }

    #[test]
    fn interrupted_and_would_block_are_retried() {
        let mut sink = Trickle {
            limit: usize::MAX,
            failures: vec![ErrorKind::WouldBlock, ErrorKind::Interrupted],
            ..Default::default()
        };
        FrameWriter::new(&mut sink).send(120, 9, b"z").unwrap();
        assert_eq!(sink.wire, [8, 0, 0, 0, 120, 9, 0, b'z']);
    }

    #[test]
    fn broken_pipe_propagates() {
        let mut sink = Trickle {
            limit: usize::MAX,
            failures: vec![ErrorKind::BrokenPipe],
            ..Default::default()
        };
        let err = FrameWriter::new(&mut sink).send(1, 1, b"x").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
        assert!(sink.wire.is_empty());
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut sink = Trickle::default();
        let err = FrameWriter::new(&mut sink).send(1, 1, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(sink.flushes, 0);
    }

    #[test]
    fn write_frame_matches_send() {
        let frame = Frame::new(125, 7, "stat");
        let (mut a, mut b) = (Vec::new(), Vec::new());
        FrameWriter::new(&mut a).write_frame(&frame).unwrap();
        FrameWriter::new(&mut b).send(125, 7, b"stat").unwrap();
        assert_eq!(a, b);

        let mut reader = crate::reader::FrameReader::new(a.as_slice());
        assert_eq!(reader.read_frame().unwrap(), frame);
    }
}
