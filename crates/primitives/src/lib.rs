//! Basic value types for the text-model crates.
//!
//! This crate is the leaf of the workspace: positions and regions in a
//! line-oriented document, newline classification and scanning, content-type
//! labels for partitioning, and the shared document error type. It has no
//! knowledge of documents themselves.

mod content_type;
mod error;
mod newline;
mod position;

pub use content_type::ContentType;
pub use error::DocumentError;
pub use newline::{LineSegments, NewlineKind, count_lines, eat_newline, find_newline};
pub use position::{Direction, Position, Region};
