//! The display tree (C5): parse-time-fixed movie-clip definitions, the
//! runtime node arena that owns live instances, and the frame/placement
//! engine that walks them.

pub mod arena;
pub mod command;
pub mod definition;
pub mod node;
pub mod player;

pub use arena::{NodeArena, NodeId};
pub use command::{Command, PlaceCommand};
pub use definition::{Frame, MovieClipDefinition};
pub use node::{DisplayChild, LeafNode, MovieClipNode};
pub use player::{Player, PlayerBuilder};
