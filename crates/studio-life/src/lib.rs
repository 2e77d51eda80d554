//! Studio Life Systems
//!
//! Procedural motion layered on top of whatever clip an avatar is playing:
//! blinking, breathing sway, and the small glances, nods and mouth movement
//! that make a listener look like they are listening.
//!
//! All state is per peer and seeded from the peer id, so two runs of the same
//! scene produce the same motion and two avatars never move in lockstep.

pub mod blink;
pub mod breathing;
pub mod intentionality;
pub mod life;
pub mod rng;

pub use blink::*;
pub use breathing::*;
pub use intentionality::*;
pub use life::*;
pub use rng::*;
