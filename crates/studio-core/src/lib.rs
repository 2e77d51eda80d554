//! Studio Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every studio subsystem:
//! - Identifiers (PeerId)
//! - Scene time (SceneTime, SceneClock)
//! - Spatial math (Vec3, Euler, angle wrapping, damping, easing)
//! - The error taxonomy (StudioError)

pub mod error;
pub mod id;
pub mod math;
pub mod time;

pub use error::*;
pub use id::*;
pub use math::*;
pub use time::*;
