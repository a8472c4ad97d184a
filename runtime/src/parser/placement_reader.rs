//! Decodes `PlaceObject`/`PlaceObject2`/`PlaceObject3` and
//! `RemoveObject`/`RemoveObject2` tag bodies into `Command`s. Per §4.2 these
//! are captured as data, not interpreted (add vs. modify vs. replace is
//! decided against live display-tree state in C5).

use crate::display::command::{Command, PlaceCommand};
use crate::error::ParseResult;
use crate::stream::SwfReader;

pub fn read_place_object_1(reader: &mut SwfReader) -> ParseResult<Command> {
    let character_id = reader.read_u16()?;
    let depth = reader.read_i16()?;
    let matrix = reader.read_matrix()?;
    let color_transform = if !reader.is_empty() { Some(reader.read_color_transform(false)?) } else { None };
    Ok(Command::Place(PlaceCommand {
        depth,
        character_id: Some(character_id),
        matrix: Some(matrix),
        color_transform,
        ratio: None,
        name: None,
        clip_depth: None,
    }))
}

const HAS_CLIP_ACTIONS: u8 = 0x80;
const HAS_CLIP_DEPTH: u8 = 0x40;
const HAS_NAME: u8 = 0x20;
const HAS_RATIO: u8 = 0x10;
const HAS_COLOR_TRANSFORM: u8 = 0x08;
const HAS_MATRIX: u8 = 0x04;
const HAS_CHARACTER: u8 = 0x02;
const _MOVE: u8 = 0x01;

/// Shared by PlaceObject2 and (the part of) PlaceObject3 that PlaceObject2
/// already covers.
fn read_place_object_2_fields(reader: &mut SwfReader, flags: u8) -> ParseResult<PlaceCommand> {
    let depth = reader.read_i16()?;
    let character_id = if flags & HAS_CHARACTER != 0 { Some(reader.read_u16()?) } else { None };
    let matrix = if flags & HAS_MATRIX != 0 { Some(reader.read_matrix()?) } else { None };
    let color_transform = if flags & HAS_COLOR_TRANSFORM != 0 { Some(reader.read_color_transform(true)?) } else { None };
    let ratio = if flags & HAS_RATIO != 0 { Some(reader.read_u16()?) } else { None };
    let name = if flags & HAS_NAME != 0 { Some(reader.read_cstring()?) } else { None };
    let clip_depth = if flags & HAS_CLIP_DEPTH != 0 { Some(reader.read_i16()?) } else { None };
    // ClipActions (button/clip event handlers) are out of scope (Non-goal:
    // button interaction); skip them structurally is unnecessary since the
    // caller discards any trailing bytes once the tag's declared length is
    // exhausted.
    let _ = flags & HAS_CLIP_ACTIONS;
    Ok(PlaceCommand { depth, character_id, matrix, color_transform, ratio, name, clip_depth })
}

pub fn read_place_object_2(reader: &mut SwfReader) -> ParseResult<Command> {
    let flags = reader.read_u8()?;
    Ok(Command::Place(read_place_object_2_fields(reader, flags)?))
}

/// PlaceObject3 extends PlaceObject2 with a second flags byte controlling
/// filters/blend-mode/bitmap-cache/class-name/visibility/background-color,
/// all parsed-and-ignored per §4.5.1. We read flags2 only to know whether a
/// class-name string precedes the rest of the record; any other optional
/// field left unread is harmless since the tag is already length-delimited.
pub fn read_place_object_3(reader: &mut SwfReader) -> ParseResult<Command> {
    let flags = reader.read_u8()?;
    let flags2 = reader.read_u8()?;
    const HAS_CLASS_NAME: u8 = 0x08;
    if flags2 & HAS_CLASS_NAME != 0 || (flags & HAS_CHARACTER != 0 && flags2 & 0x04 != 0) {
        let _class_name = reader.read_cstring()?;
    }
    Ok(Command::Place(read_place_object_2_fields(reader, flags)?))
}

pub fn read_remove_object_1(reader: &mut SwfReader) -> ParseResult<Command> {
    let _character_id = reader.read_u16()?;
    let depth = reader.read_i16()?;
    Ok(Command::Remove { depth })
}

pub fn read_remove_object_2(reader: &mut SwfReader) -> ParseResult<Command> {
    let depth = reader.read_i16()?;
    Ok(Command::Remove { depth })
}
