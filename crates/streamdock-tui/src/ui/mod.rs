//! Dashboard rendering.

mod layout;

pub use layout::render;
