//! Studio Test Harness - Scenario driving and end-to-end properties
//!
//! This crate provides:
//! - Mock scene graph, asset source and backdrop
//! - A frame-stepping harness around the scene director
//! - Checkers for grounding, blinking and camera cut behavior

pub mod mock;
pub mod harness;
pub mod properties;

pub use mock::*;
pub use harness::*;
pub use properties::*;
