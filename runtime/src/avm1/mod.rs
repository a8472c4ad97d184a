//! The AVM1 action interpreter (C6): value model, scope chains, per-clip
//! execution contexts, and the opcode dispatch loop.

pub mod context;
pub mod interpreter;
pub mod object;
pub mod opcode;
pub mod scope;
pub mod value;

pub use context::Context;
pub use interpreter::{execute, ExecutionOutcome};
pub use object::ScriptObject;
pub use scope::Scope;
pub use value::Value;
