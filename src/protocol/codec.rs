use std::io::Read;
use std::io::Write;

use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use super::Payload;
use super::RequestFrame;
use super::Response;
use super::ResponseFrame;
use crate::constants::MAX_DOCUMENT_SIZE;
use crate::CompressionConfig;
use crate::Error;
use crate::Result;

pub const REQUEST_MAGIC: u8 = 0x80;
pub const RESPONSE_MAGIC: u8 = 0x81;

/// Frame encoder shared by client and embedded store.
///
/// Layout: one magic byte followed by the bincode body. Document payloads
/// are zlib-compressed when that shrinks them below `min_ratio`.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    compression: CompressionConfig,
}

impl Codec {
    pub fn new(compression: CompressionConfig) -> Self {
        Self { compression }
    }

    pub fn encode_request(
        &self,
        mut frame: RequestFrame,
    ) -> Result<Bytes> {
        if let Some(payload) = frame.body.payload_mut() {
            self.maybe_compress(payload)?;
        }
        encode(REQUEST_MAGIC, &frame)
    }

    pub fn decode_request(
        &self,
        raw: &[u8],
    ) -> Result<RequestFrame> {
        let mut frame: RequestFrame = decode(REQUEST_MAGIC, raw)?;
        if let Some(payload) = frame.body.payload_mut() {
            inflate(payload)?;
        }
        Ok(frame)
    }

    pub fn encode_response(
        &self,
        mut frame: ResponseFrame,
    ) -> Result<Bytes> {
        if let Response::Document { value, .. } = &mut frame.body {
            self.maybe_compress(value)?;
        }
        encode(RESPONSE_MAGIC, &frame)
    }

    pub fn decode_response(
        &self,
        raw: &[u8],
    ) -> Result<ResponseFrame> {
        let mut frame: ResponseFrame = decode(RESPONSE_MAGIC, raw)?;
        if let Response::Document { value, .. } = &mut frame.body {
            inflate(value)?;
        }
        Ok(frame)
    }

    fn maybe_compress(
        &self,
        payload: &mut Payload,
    ) -> Result<()> {
        let config = &self.compression;
        if !config.enabled || payload.compressed || payload.data.len() < config.min_size {
            return Ok(());
        }

        let compressed = compress(&payload.data)?;
        let ratio = compressed.len() as f64 / payload.data.len() as f64;
        if ratio <= config.min_ratio {
            trace!(
                "[:Codec:compress] {} -> {} bytes (ratio {:.2})",
                payload.data.len(),
                compressed.len(),
                ratio
            );
            payload.data = Bytes::from(compressed);
            payload.compressed = true;
        }
        Ok(())
    }
}

fn encode<T: Serialize>(
    magic: u8,
    frame: &T,
) -> Result<Bytes> {
    let body = bincode::serialize(frame)?;
    let mut buf = BytesMut::with_capacity(body.len() + 1);
    buf.put_u8(magic);
    buf.put_slice(&body);
    Ok(buf.freeze())
}

fn decode<T: DeserializeOwned>(
    magic: u8,
    raw: &[u8],
) -> Result<T> {
    match raw.split_first() {
        Some((m, body)) if *m == magic => Ok(bincode::deserialize(body)?),
        Some((m, _)) => Err(Error::Protocol(format!(
            "bad magic {m:#04x}, expected {magic:#04x}"
        ))),
        None => Err(Error::Protocol("empty frame".into())),
    }
}

fn inflate(payload: &mut Payload) -> Result<()> {
    if payload.compressed {
        payload.data = Bytes::from(decompress(&payload.data)?);
        payload.compressed = false;
    }
    Ok(())
}

pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder
        .write_all(data)
        .map_err(|e| Error::Protocol(format!("compress: {e}")))?;
    encoder.finish().map_err(|e| Error::Protocol(format!("compress: {e}")))
}

pub(crate) fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .take(MAX_DOCUMENT_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::Protocol(format!("decompress: {e}")))?;
    if out.len() > MAX_DOCUMENT_SIZE {
        return Err(Error::Protocol("decompressed payload exceeds document size limit".into()));
    }
    Ok(out)
}
