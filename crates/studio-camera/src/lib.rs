//! Studio Camera
//!
//! The unattended camera crew. The director decides *what* to show and
//! *when* to cut; framing turns a shot type plus the subjects in the focus
//! zone into concrete camera poses; the animator moves the camera there; the
//! gaffer keeps the key light on whoever is talking.
//!
//! Nothing here knows about sockets, clips or skeletons. The runtime feeds
//! in subject positions and the active speaker each tick.

pub mod animator;
pub mod director;
pub mod framing;
pub mod gaffer;
pub mod shot;
pub mod zone;

pub use animator::*;
pub use director::*;
pub use framing::*;
pub use gaffer::*;
pub use shot::*;
pub use zone::*;
