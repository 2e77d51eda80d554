//! Studio Runtime
//!
//! Ties the engine together:
//! - `director`: [`SceneDirector`], the single owner of all per-peer state,
//!   advanced by `tick(dt)` and by incoming directives
//! - `job`: asynchronous work the director asks for, and its results
//! - `scene`: traits for the renderer, asset source and backdrop
//! - `driver`: tokio loop wiring channel, jobs and the frame tick
//! - `config` / `logging`: startup configuration and tracing setup

pub mod config;
pub mod director;
pub mod driver;
pub mod job;
pub mod logging;
pub mod scene;

pub use config::*;
pub use director::*;
pub use driver::*;
pub use job::*;
pub use logging::*;
pub use scene::*;
