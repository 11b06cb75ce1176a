//! Media module for item representation and parsing.

pub mod item;
pub mod parser;

pub use item::{MediaCandidate, MediaKind, ResolutionResult};
pub use parser::MediaExtractor;
