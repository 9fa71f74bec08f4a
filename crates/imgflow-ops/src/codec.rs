// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Codec adapter. Base64 text (optionally a data URI) decodes to a pixel
// buffer; results encode back out as a PNG data URI.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use imgflow_core::error::{ImgflowError, Result};
use tracing::{debug, instrument};

use crate::buffer::PixelBuffer;

/// Prefix put in front of every encoded result.
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Decode base64 image text into a 3-channel colour buffer.
///
/// Everything up to and including the first comma is treated as a data-URI
/// header and dropped. The container format is sniffed from the bytes.
#[instrument(skip_all, fields(text_len = text.len()))]
pub fn decode(text: &str) -> Result<PixelBuffer> {
    let payload = strip_data_uri(text.trim());
    if payload.is_empty() {
        return Err(ImgflowError::Decode("image data is empty".into()));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|err| ImgflowError::Decode(format!("invalid base64: {err}")))?;

    decode_bytes(&bytes)
}

/// Decode an already-unwrapped encoded image (PNG, JPEG, ...).
pub fn decode_bytes(bytes: &[u8]) -> Result<PixelBuffer> {
    if bytes.is_empty() {
        return Err(ImgflowError::Decode("image data is empty".into()));
    }
    let img = image::load_from_memory(bytes)
        .map_err(|err| ImgflowError::Decode(format!("unrecognised image data: {err}")))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(ImgflowError::Decode("image has no pixels".into()));
    }
    debug!(
        width = img.width(),
        height = img.height(),
        "Image decoded from bytes"
    );
    Ok(PixelBuffer::Color(img.to_rgb8()))
}

/// Encode a buffer as a PNG data URI.
#[instrument(skip_all, fields(width = buffer.width(), height = buffer.height(), channels = buffer.channels()))]
pub fn encode(buffer: &PixelBuffer) -> Result<String> {
    let png = encode_png(buffer)?;
    Ok(format!("{PNG_DATA_URI_PREFIX}{}", STANDARD.encode(&png)))
}

/// Serialize a buffer to PNG bytes. Single-channel buffers become 8-bit
/// grayscale PNGs.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>> {
    if buffer.is_empty() {
        return Err(ImgflowError::Encode("buffer has no pixels".into()));
    }
    let mut cursor = Cursor::new(Vec::new());
    buffer
        .clone()
        .into_dynamic()
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|err| ImgflowError::Encode(format!("PNG encoding failed: {err}")))?;
    let bytes = cursor.into_inner();
    if bytes.is_empty() {
        return Err(ImgflowError::Encode("PNG encoder produced no bytes".into()));
    }
    Ok(bytes)
}

fn strip_data_uri(text: &str) -> &str {
    match text.split_once(',') {
        Some((_, rest)) => rest,
        None => text,
    }
}
