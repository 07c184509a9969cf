//! Edges of the system: the CSV replay format and text rendering.

pub mod csv;
pub mod presentation;
