//! Compression codecs for namespace content.
//!
//! Compression happens on the client, with async encoders so file content can
//! be streamed straight into a request body. Decompression happens on the
//! write path of the store and is fed one chunk at a time.

use crate::error::{Error, Result};
use crate::namespace::Compression;
use async_compression::Level;
use async_compression::tokio::bufread::ZlibEncoder as ZlibReadEncoder;
use async_compression::tokio::write::ZlibEncoder;
use flate2::{Decompress, FlushDecompress, Status};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader};

/// zlib level used for all uploads.
pub const COMPRESSION_LEVEL: i32 = 7;

const INFLATE_BUF_SIZE: usize = 64 * 1024;

/// A boxed async reader yielding compressed bytes.
pub type CompressedReader = Pin<Box<dyn AsyncRead + Send + Sync>>;

/// Compress a complete buffer.
pub async fn compress(compression: Compression, data: &[u8]) -> std::io::Result<Vec<u8>> {
    match compression {
        Compression::Identity => Ok(data.to_vec()),
        Compression::Zlib => {
            let mut encoder =
                ZlibEncoder::with_quality(Vec::new(), Level::Precise(COMPRESSION_LEVEL));
            encoder.write_all(data).await?;
            encoder.shutdown().await?;
            Ok(encoder.into_inner())
        }
    }
}

/// Wrap a reader so that reading from it yields compressed bytes.
pub fn compress_reader<R>(compression: Compression, reader: R) -> CompressedReader
where
    R: AsyncRead + Send + Sync + Unpin + 'static,
{
    match compression {
        Compression::Identity => Box::pin(reader),
        Compression::Zlib => Box::pin(ZlibReadEncoder::with_quality(
            BufReader::new(reader),
            Level::Precise(COMPRESSION_LEVEL),
        )),
    }
}

/// Incremental decompressor.
///
/// Feed compressed chunks with [`Decompressor::feed`]; decompressed output is
/// handed to the sink as it becomes available. [`Decompressor::finish`] must
/// be called once the input is exhausted to detect truncated streams.
pub struct Decompressor {
    inner: Inner,
}

enum Inner {
    Identity,
    Zlib(Box<ZlibInflater>),
}

impl Decompressor {
    pub fn new(compression: Compression) -> Self {
        let inner = match compression {
            Compression::Identity => Inner::Identity,
            Compression::Zlib => Inner::Zlib(Box::new(ZlibInflater::new())),
        };
        Self { inner }
    }

    /// Decompress one chunk of input.
    pub fn feed(&mut self, input: &[u8], sink: &mut dyn FnMut(&[u8])) -> Result<()> {
        match &mut self.inner {
            Inner::Identity => {
                sink(input);
                Ok(())
            }
            Inner::Zlib(inflater) => inflater.feed(input, sink),
        }
    }

    /// Flush remaining output and check that the stream ended cleanly.
    pub fn finish(self, sink: &mut dyn FnMut(&[u8])) -> Result<()> {
        match self.inner {
            Inner::Identity => Ok(()),
            Inner::Zlib(mut inflater) => inflater.finish(sink),
        }
    }
}

/// Decompress a complete buffer.
pub fn decompress(compression: Compression, data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut decompressor = Decompressor::new(compression);
    decompressor.feed(data, &mut |chunk| out.extend_from_slice(chunk))?;
    decompressor.finish(&mut |chunk| out.extend_from_slice(chunk))?;
    Ok(out)
}

struct ZlibInflater {
    state: Decompress,
    header: [u8; 2],
    header_len: usize,
    done: bool,
    buf: Vec<u8>,
}

impl ZlibInflater {
    fn new() -> Self {
        Self {
            state: Decompress::new(true),
            header: [0; 2],
            header_len: 0,
            done: false,
            buf: vec![0; INFLATE_BUF_SIZE],
        }
    }

    fn feed(&mut self, mut input: &[u8], sink: &mut dyn FnMut(&[u8])) -> Result<()> {
        if self.header_len < 2 {
            let take = (2 - self.header_len).min(input.len());
            self.header[self.header_len..self.header_len + take].copy_from_slice(&input[..take]);
            self.header_len += take;
            input = &input[take..];
            if self.header_len < 2 {
                return Ok(());
            }
            check_header(self.header)?;
            let header = self.header;
            self.inflate(&header, sink)?;
        }
        self.inflate(input, sink)
    }

    fn inflate(&mut self, mut input: &[u8], sink: &mut dyn FnMut(&[u8])) -> Result<()> {
        loop {
            if self.done {
                if input.is_empty() {
                    return Ok(());
                }
                return Err(Error::CorruptData(
                    "trailing data after end of stream".to_string(),
                ));
            }

            let before_in = self.state.total_in();
            let before_out = self.state.total_out();
            let status = self
                .state
                .decompress(input, &mut self.buf, FlushDecompress::None)
                .map_err(|e| Error::CorruptData(e.to_string()))?;
            let consumed = (self.state.total_in() - before_in) as usize;
            let produced = (self.state.total_out() - before_out) as usize;

            if produced > 0 {
                sink(&self.buf[..produced]);
            }
            input = &input[consumed..];

            // inflate may flush buffered output without consuming input, so
            // keep going until the chunk is used up and the output drained.
            match status {
                Status::StreamEnd => self.done = true,
                Status::Ok | Status::BufError => {
                    if consumed == 0 && produced == 0 {
                        if input.is_empty() {
                            return Ok(());
                        }
                        return Err(Error::CorruptData(
                            "inflate made no progress".to_string(),
                        ));
                    }
                    if input.is_empty() && produced < self.buf.len() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn finish(&mut self, sink: &mut dyn FnMut(&[u8])) -> Result<()> {
        if self.header_len < 2 {
            return Err(Error::CorruptHeader("unexpected end of stream".to_string()));
        }
        while !self.done {
            let before_out = self.state.total_out();
            let status = self
                .state
                .decompress(&[], &mut self.buf, FlushDecompress::Finish)
                .map_err(|e| Error::CorruptData(e.to_string()))?;
            let produced = (self.state.total_out() - before_out) as usize;
            if produced > 0 {
                sink(&self.buf[..produced]);
            }
            match status {
                Status::StreamEnd => self.done = true,
                _ if produced == 0 => {
                    return Err(Error::CorruptData("unexpected end of stream".to_string()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Validate the two-byte RFC 1950 header.
fn check_header(header: [u8; 2]) -> Result<()> {
    let [cmf, flg] = header;
    if cmf & 0x0f != 8 {
        return Err(Error::CorruptHeader(format!(
            "unsupported compression method {}",
            cmf & 0x0f
        )));
    }
    if cmf >> 4 > 7 {
        return Err(Error::CorruptHeader(format!(
            "window size {} out of range",
            cmf >> 4
        )));
    }
    if ((u16::from(cmf) << 8) | u16::from(flg)) % 31 != 0 {
        return Err(Error::CorruptHeader("header checksum mismatch".to_string()));
    }
    if flg & 0x20 != 0 {
        return Err(Error::CorruptHeader("preset dictionary not supported".to_string()));
    }
    Ok(())
}
