//! Core types and configuration for streamdock.
//!
//! This crate provides the session model, the session registry that tracks
//! the containers streamdock owns, configuration management, the event
//! contract shared with the presentation layer, and error types used across
//! the streamdock workspace.

mod config;
mod error;
mod events;
mod logbook;
mod registry;
mod session;

pub use config::Config;
pub use error::{Error, Result};
pub use events::{EventSink, SessionEvent};
pub use logbook::{LogBook, LogLine};
pub use registry::SessionRegistry;
pub use session::{OUTPUT_MOUNT, OutputMode, STDOUT_SENTINEL, Session, SessionStatus, StreamRequest};
