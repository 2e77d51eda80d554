//! Studio Avatars
//!
//! Everything that belongs to one avatar's body, as opposed to the camera:
//!
//! - `skeleton`: humanoid bones, height measurement, ground anchoring
//! - `clip` / `mixer`: keyframed clips and the per-avatar cross-fade mixer
//! - `clip_cache`: memoized clip fetches keyed by source URL
//! - `library`: clip URLs for idles, walking, emotions and gestures
//! - `registry`: avatar lifecycle, home positions, idle rotation
//! - `movement`: walk/arrive state machine
//! - `gaze`: bounded turn-to-face smoothing
//!
//! None of these modules perform I/O. Fetching models and clips is the
//! runtime's job; this crate only decides what to fetch and what to do with
//! the result once it arrives.

pub mod clip;
pub mod clip_cache;
pub mod gaze;
pub mod library;
pub mod mixer;
pub mod movement;
pub mod registry;
pub mod skeleton;

pub use clip::*;
pub use clip_cache::*;
pub use gaze::*;
pub use library::*;
pub use mixer::*;
pub use movement::*;
pub use registry::*;
pub use skeleton::*;
