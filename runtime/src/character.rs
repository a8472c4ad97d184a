//! The character dictionary (C3): an id-keyed, set-once, immutable table of
//! shape/morph/bitmap/movie-clip definitions, populated by the tag parser
//! and consumed by the display tree.

use std::collections::HashMap;

use crate::display::MovieClipDefinition;
use crate::error::ParseError;
use crate::parser::bitmap::CompressedBitmap;
use crate::shape::{MorphShapeDefinition, ShapeDefinition};
use crate::types::CharacterId;

/// An immutable character definition, keyed by a 16-bit id.
#[derive(Debug, Clone)]
pub enum Character {
    Shape(ShapeDefinition),
    MorphShape(MorphShapeDefinition),
    Bitmap(CompressedBitmap),
    MovieClip(std::sync::Arc<MovieClipDefinition>),
}

/// The process-wide (per-player) character dictionary. Every id is set at
/// most once; reads are total and return `None` for an unregistered id,
/// which callers must treat as a placement no-op.
#[derive(Debug, Default)]
pub struct Dictionary {
    characters: HashMap<CharacterId, Character>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, id: CharacterId, character: Character) -> Result<(), ParseError> {
        if self.characters.contains_key(&id) {
            return Err(ParseError::DuplicateCharacterId(id));
        }
        self.characters.insert(id, character);
        Ok(())
    }

    pub fn get(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }
}
