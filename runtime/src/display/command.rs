//! Frame commands: the parsed-but-uninterpreted form of a placement tag.
//! Parsing records *what the tag says*; deciding whether it adds, replaces,
//! modifies or promotes a deprecated instance happens at execution time
//! against the live display tree (§4.5.1).

use crate::types::{CharacterId, ColorTransform, Depth, Matrix};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Place(PlaceCommand),
    Remove { depth: Depth },
}

/// The union of PlaceObject/PlaceObject2/PlaceObject3 fields the core
/// cares about. PlaceObject3's additional mask bits (filters, blend mode,
/// bitmap cache, class name, visibility, background color) are parsed by
/// the tag decoder and dropped here, per §4.5.1.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceCommand {
    pub depth: Depth,
    /// `Some` selects "place with id" semantics; `None` with a still-true
    /// move flag selects "modify" semantics.
    pub character_id: Option<CharacterId>,
    pub matrix: Option<Matrix>,
    pub color_transform: Option<ColorTransform>,
    pub ratio: Option<u16>,
    pub name: Option<String>,
    pub clip_depth: Option<Depth>,
}
