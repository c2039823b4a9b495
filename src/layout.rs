mod block;
mod typography;
mod walker;

pub use block::{Align, BlockKind, BlockStyle, CoverImage, LayoutBlock, ListMarker, Rgb};
pub use typography::{FontRoles, StyleKind, Typography};
pub use walker::walk;
