//! Stream decoder implementations for PDF filters.
//!
//! This tool only rewrites content streams, so it implements the two filters
//! those streams realistically carry:
//! - FlateDecode (zlib/deflate) - most common
//! - ASCIIHexDecode - hexadecimal encoding
//!
//! Any other filter name is rejected with `Error::UnsupportedFilter` so the
//! run aborts before producing partial output. The encode side always emits
//! FlateDecode for rewritten streams.

use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g. "FlateDecode").
    fn name(&self) -> &str;
}

/// FlateDecode filter implementation.
///
/// Decompresses data using the zlib/deflate algorithm.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(input);
        let mut output = Vec::new();

        match decoder.read_to_end(&mut output) {
            Ok(_) => Ok(output),
            Err(e) => {
                // Partial recovery: if we got any data before the error, use it
                if !output.is_empty() {
                    log::warn!(
                        "FlateDecode partial recovery: extracted {} bytes before corruption: {}",
                        output.len(),
                        e
                    );
                    return Ok(output);
                }

                // Some PDFs have corrupt zlib headers but valid deflate data
                log::debug!("Zlib decode failed, trying raw deflate");
                output.clear();
                let mut deflate_decoder = DeflateDecoder::new(input);
                match deflate_decoder.read_to_end(&mut output) {
                    Ok(_) => Ok(output),
                    Err(_) => Err(Error::Decode(format!("FlateDecode failed: {}", e))),
                }
            },
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

/// ASCIIHexDecode filter implementation.
///
/// Decodes pairs of hex digits; whitespace is ignored and `>` terminates the
/// data. An odd trailing digit is padded with 0, per the PDF spec.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut pending: Option<u8> = None;

        for &byte in input {
            let digit = match byte {
                b'0'..=b'9' => byte - b'0',
                b'a'..=b'f' => byte - b'a' + 10,
                b'A'..=b'F' => byte - b'A' + 10,
                b'>' => break,
                b if b.is_ascii_whitespace() || b == 0x00 => continue,
                b => {
                    return Err(Error::Decode(format!(
                        "ASCIIHexDecode: invalid character 0x{:02X}",
                        b
                    )));
                },
            };

            match pending.take() {
                Some(high) => output.push((high << 4) | digit),
                None => pending = Some(digit),
            }
        }

        // Odd number of digits: final digit is the high nibble
        if let Some(high) = pending {
            output.push(high << 4);
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

/// Decode stream data using a filter pipeline.
///
/// PDF streams can have multiple filters applied in sequence; this applies
/// each named filter in order.
pub fn decode_stream(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder: Box<dyn StreamDecoder> = match filter_name.as_str() {
            "FlateDecode" => Box::new(FlateDecoder),
            "ASCIIHexDecode" => Box::new(AsciiHexDecoder),
            _ => return Err(Error::UnsupportedFilter(filter_name.clone())),
        };

        log::debug!("Applying {} to {} bytes", decoder.name(), current.len());
        current = decoder.decode(&current)?;
    }

    Ok(current)
}

/// Compress data with zlib for storage as a FlateDecode stream.
pub fn flate_encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
