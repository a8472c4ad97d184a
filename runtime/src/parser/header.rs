//! The 8-field file header (§4.2) plus the two tags whose fields belong to
//! the movie as a whole rather than to any clip: `ScriptLimits` and
//! `SetBackgroundColor`.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::{ParseError, ParseResult};
use crate::stream::SwfReader;
use crate::types::Rectangle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovieHeader {
    pub version: u8,
    pub frame_size: Rectangle,
    pub frame_rate: f32,
    pub num_frames: u16,
}

/// Recursion-depth and wall-clock budgets for the AVM, read from the
/// `ScriptLimits` tag. The defaults match the original player's compiled-in
/// constants and are used when the tag is absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptLimits {
    pub max_recursion_depth: u16,
    pub script_timeout_seconds: u16,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self { max_recursion_depth: 256, script_timeout_seconds: 15 }
    }
}

/// Splits the 3-byte signature/version/length prefix from the body, running
/// the body through zlib inflate first if the file is compressed. Returns
/// the decompressed (or as-is) tag stream, ready for `read_rect` etc.
pub fn split_header(data: &[u8]) -> ParseResult<(u8, Vec<u8>)> {
    if data.len() < 8 {
        return Err(ParseError::UnexpectedEof);
    }
    let signature = data[0];
    if data[1] != b'W' || data[2] != b'S' {
        return Err(ParseError::MalformedBinary("missing WS signature bytes".into()));
    }
    let version = data[3];
    // bytes[4..8] are the little-endian file length; advisory only, not
    // load-bearing for parsing since the tag stream is self-delimiting.
    let body = &data[8..];
    let decompressed = match signature {
        b'F' => body.to_vec(),
        b'C' => {
            let mut out = Vec::new();
            ZlibDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| ParseError::Inflate(e.to_string()))?;
            out
        }
        _ => return Err(ParseError::MalformedBinary(format!("unknown signature byte {signature:#x}"))),
    };
    Ok((version, decompressed))
}

/// Reads the frame rect / frame rate / frame count that follow the
/// signature prefix, from the already-decompressed tag stream.
pub fn read_movie_header(version: u8, reader: &mut SwfReader) -> ParseResult<MovieHeader> {
    let frame_size = reader.read_rect()?;
    let frame_rate = reader.read_fixed16()?;
    let num_frames = reader.read_u16()?;
    Ok(MovieHeader { version, frame_size, frame_rate, num_frames })
}

pub fn read_script_limits(reader: &mut SwfReader) -> ParseResult<ScriptLimits> {
    let max_recursion_depth = reader.read_u16()?;
    let script_timeout_seconds = reader.read_u16()?;
    Ok(ScriptLimits { max_recursion_depth, script_timeout_seconds })
}
