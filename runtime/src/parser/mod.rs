//! The tag parser (C2): file header, tag dispatch loop, and per-tag
//! decoders that populate the character dictionary (C3) and the movie's
//! frame/command/action lists (C5's static data).

pub mod bitmap;
pub mod decode;
mod header;
mod placement_reader;
mod shape_reader;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::character::{Character, Dictionary};
use crate::display::definition::{Frame, MovieClipDefinition};
use crate::error::{ParseError, ParseResult};
use crate::stream::SwfReader;
use crate::tag_code::TagCode;
use crate::types::Color;

pub use bitmap::CompressedBitmap;
pub use header::{MovieHeader, ScriptLimits};

/// Everything a fully parsed movie exposes to the player.
pub struct ParsedMovie {
    pub header: MovieHeader,
    pub dictionary: Dictionary,
    pub root: Arc<MovieClipDefinition>,
    pub script_limits: ScriptLimits,
    pub background_color: Color,
}

/// Parses a whole SWF file (header, inflate if compressed, and the full tag
/// tree) into a `ParsedMovie`. Parse errors are fatal: the player fails to
/// construct.
pub fn parse_movie(data: &[u8]) -> ParseResult<ParsedMovie> {
    let (version, body) = header::split_header(data)?;
    let mut reader = SwfReader::new(&body);
    let movie_header = header::read_movie_header(version, &mut reader)?;

    let mut dictionary = Dictionary::new();
    let mut script_limits = None;
    let mut background_color = Color::BLACK;

    let root = parse_tag_stream(&mut reader, version, &mut dictionary, &mut script_limits, &mut background_color)?;

    Ok(ParsedMovie {
        header: movie_header,
        dictionary,
        root: Arc::new(root),
        script_limits: script_limits.unwrap_or_default(),
        background_color,
    })
}

/// Reads one tag-stream body (the root movie, or a nested `DefineSprite`)
/// into a `MovieClipDefinition`. Recursion is the "saved interrupted frame"
/// mechanism named in §4.2: the Rust call stack holds whatever frame the
/// enclosing sprite was mid-building the whole time a nested `DefineSprite`
/// is parsed, and control returns to it exactly where it left off.
fn parse_tag_stream(
    reader: &mut SwfReader,
    swf_version: u8,
    dictionary: &mut Dictionary,
    script_limits: &mut Option<ScriptLimits>,
    background_color: &mut Color,
) -> ParseResult<MovieClipDefinition> {
    let mut def = MovieClipDefinition::default();
    let mut current_frame = Frame::default();

    loop {
        if reader.is_empty() {
            break;
        }
        let tag_header = reader.read_u16()?;
        let code = tag_header >> 6;
        let mut len = (tag_header & 0x3F) as u32;
        if len == 0x3F {
            len = reader.read_u32()?;
        }
        let mut body = reader.extract(len as usize)?;
        let tag_code = TagCode::from_code(code);

        match tag_code {
            TagCode::End => {
                break;
            }
            TagCode::ShowFrame => {
                def.frames.push(std::mem::take(&mut current_frame));
            }
            TagCode::DefineShape => {
                let tag_version = TagCode::version_of(code);
                let (id, raw_shape) = shape_reader::read_define_shape(&mut body, tag_version)?;
                match crate::shape::tessellate(&raw_shape) {
                    Ok(shape) => dictionary.define(id, Character::Shape(shape))?,
                    Err(e) => warn!(character_id = id, error = %e, "shape tesselation failed, dropping character"),
                }
            }
            TagCode::DefineMorphShape => {
                let tag_version = TagCode::version_of(code);
                let (id, start_raw, end_raw) = shape_reader::read_define_morph_shape(&mut body, tag_version)?;
                match (crate::shape::tessellate(&start_raw), crate::shape::tessellate(&end_raw)) {
                    (Ok(start), Ok(end)) => {
                        dictionary.define(id, Character::MorphShape(crate::shape::MorphShapeDefinition { start, end }))?
                    }
                    _ => warn!(character_id = id, "morph shape tesselation failed, dropping character"),
                }
            }
            TagCode::PlaceObject => {
                let tag_version = TagCode::version_of(code);
                let command = match tag_version {
                    1 => placement_reader::read_place_object_1(&mut body)?,
                    2 => placement_reader::read_place_object_2(&mut body)?,
                    _ => placement_reader::read_place_object_3(&mut body)?,
                };
                current_frame.commands.push(command);
            }
            TagCode::RemoveObject => {
                let tag_version = TagCode::version_of(code);
                let command = if tag_version == 1 {
                    placement_reader::read_remove_object_1(&mut body)?
                } else {
                    placement_reader::read_remove_object_2(&mut body)?
                };
                current_frame.commands.push(command);
            }
            TagCode::DoAction => {
                current_frame.actions.push(body.remaining().to_vec());
            }
            TagCode::FrameLabel => {
                let label = body.read_cstring()?;
                let next_index = def.frames.len() as u16 + 1;
                def.frame_labels.insert(label, next_index);
            }
            TagCode::SetBackgroundColor => {
                *background_color = body.read_rgb()?;
            }
            TagCode::ScriptLimits => {
                *script_limits = Some(header::read_script_limits(&mut body)?);
            }
            TagCode::DefineSprite => {
                let id = body.read_u16()?;
                let _frame_count = body.read_u16()?;
                let nested = parse_tag_stream(&mut body, swf_version, dictionary, script_limits, background_color)?;
                dictionary.define(id, Character::MovieClip(Arc::new(nested)))?;
            }
            TagCode::DefineBitsJpeg => {
                if let Some(id) = decode_bits_jpeg(code, &mut body, dictionary)? {
                    debug!(character_id = id, "defined jpeg bitmap character");
                }
            }
            TagCode::DefineBitsLossless => {
                decode_bits_lossless(code, &mut body, dictionary)?;
            }
            TagCode::DefineSceneAndFrameLabelData => {
                read_scene_and_frame_labels(&mut body, &mut def)?;
            }
            TagCode::ExportAssets | TagCode::FileAttributes | TagCode::Metadata => {
                // Recognized but not consumed into any model the core
                // exposes: asset export naming and the file-attributes /
                // metadata tags don't affect playback semantics here.
            }
            TagCode::Unknown(other) => {
                debug!(tag_code = other, len, "skipping unknown tag");
            }
        }
    }

    if !current_frame.commands.is_empty() || !current_frame.actions.is_empty() {
        // A stream that ends without a final ShowFrame; keep the partially
        // built frame rather than silently dropping its commands.
        def.frames.push(current_frame);
    }

    Ok(def)
}

fn decode_bits_jpeg(code: u16, body: &mut SwfReader, dictionary: &mut Dictionary) -> ParseResult<Option<u16>> {
    let id = body.read_u16()?;
    let data: Vec<u8>;
    let alpha: Option<Vec<u8>>;
    if code == 6 {
        // DefineBits: the body is raw JPEG data only; JPEGTables (a
        // separate, optional tag not modeled here) supplies shared headers.
        data = body.remaining().to_vec();
        alpha = None;
    } else if code == 8 || code == 21 {
        data = body.remaining().to_vec();
        alpha = None;
    } else {
        // DefineBitsJPEG3/4: an explicit data length prefixes the image,
        // followed by a zlib-compressed alpha channel.
        let jpeg_len = body.read_u32()? as usize;
        if code == 90 {
            let _deblocking = body.read_fixed16()?;
        }
        let remaining = body.remaining();
        if jpeg_len > remaining.len() {
            return Err(ParseError::MalformedBinary("DefineBitsJPEG3/4 length exceeds tag body".into()));
        }
        data = remaining[..jpeg_len].to_vec();
        alpha = Some(remaining[jpeg_len..].to_vec());
    }
    let cleaned = decode::remove_invalid_jpeg_data(&data);
    let (width, height) = match decode::decode_define_bits_jpeg_dimensions(&cleaned) {
        Ok(dims) => dims,
        Err(e) => {
            warn!(character_id = id, error = %e, "failed to read jpeg dimensions, dropping character");
            return Ok(None);
        }
    };
    dictionary.define(id, Character::Bitmap(CompressedBitmap::Jpeg { data: cleaned.into_owned(), alpha, width, height }))?;
    Ok(Some(id))
}

fn decode_bits_lossless(code: u16, body: &mut SwfReader, dictionary: &mut Dictionary) -> ParseResult<()> {
    use bitmap::LosslessFormat;

    let id = body.read_u16()?;
    let format_code = body.read_u8()?;
    let width = body.read_u16()?;
    let height = body.read_u16()?;
    let format = match format_code {
        3 => LosslessFormat::ColorMap8,
        4 => LosslessFormat::Rgb15,
        5 => LosslessFormat::Rgb32,
        other => return Err(ParseError::MalformedBinary(format!("unknown lossless bitmap format {other}"))),
    };
    let _ = code; // DefineBitsLossless vs. Lossless2 differ only in whether alpha is present in the RGB32 data.
    let data = body.remaining().to_vec();
    dictionary.define(id, Character::Bitmap(CompressedBitmap::Lossless { format, width, height, data }))?;
    Ok(())
}

fn read_scene_and_frame_labels(reader: &mut SwfReader, def: &mut MovieClipDefinition) -> ParseResult<()> {
    let scene_count = reader.read_encoded_u32()?;
    for _ in 0..scene_count {
        let frame_offset = reader.read_encoded_u32()?;
        let name = reader.read_cstring()?;
        def.frame_labels.insert(name, frame_offset as u16 + 1);
    }
    let label_count = reader.read_encoded_u32()?;
    for _ in 0..label_count {
        let frame_num = reader.read_encoded_u32()?;
        let name = reader.read_cstring()?;
        def.frame_labels.insert(name, frame_num as u16 + 1);
    }
    Ok(())
}
