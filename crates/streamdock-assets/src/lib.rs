//! Build context for the streamlink + Tor image.
//!
//! The image recipe, Tor configuration, container entrypoint and the
//! streamlink site plugin are embedded at compile time and written out
//! byte for byte.

mod context;

pub use context::{Asset, BUILD_CONTEXT, write_build_context};
