//! Camera Animator
//!
//! Two modes. Static shots are approached exponentially at the shot's lerp
//! speed, so rapid re-targeting never produces a jump. Motion shots (dolly,
//! pull-back, orbit) follow a quintic ease over their duration and then hold
//! the final pose. Roll damps toward its own target in both modes.

use serde::Deserialize;
use studio_core::{damp, damp_angle, ease_in_out_quintic, Vec3};

use crate::{CameraPose, Shot, ShotMotion};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    /// Roll approach rate (1/s)
    pub roll_rate: f32,
    /// Field of view before the first shot
    pub initial_fov: f32,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            roll_rate: 2.0,
            initial_fov: 45.0,
        }
    }
}

/// What the renderer's camera should be this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    pub look_at: Vec3,
    pub fov: f32,
    pub roll: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Idle,
    Static { target: CameraPose, speed: f32 },
    Motion { motion: ShotMotion, duration: f32, elapsed: f32 },
}

pub struct CameraAnimator {
    config: AnimatorConfig,
    state: CameraState,
    mode: Mode,
    target_roll: f32,
}

impl CameraAnimator {
    pub fn new(config: AnimatorConfig) -> Self {
        let state = CameraState {
            position: Vec3::new(0.0, 1.7, 6.0),
            look_at: Vec3::new(0.0, 1.2, 0.0),
            fov: config.initial_fov,
            roll: 0.0,
        };
        Self {
            config,
            state,
            mode: Mode::Idle,
            target_roll: 0.0,
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn target_roll(&self) -> f32 {
        self.target_roll
    }

    /// Start animating toward `shot`. Every shot sets the roll target, so
    /// leaving a dutch angle by any path levels the camera.
    pub fn apply(&mut self, shot: &Shot) {
        self.target_roll = shot.roll;
        self.mode = match shot.motion {
            ShotMotion::Static(target) => Mode::Static {
                target,
                speed: shot.lerp_speed,
            },
            motion @ ShotMotion::Move { duration, .. } | motion @ ShotMotion::Orbit { duration, .. } => {
                // Motion starts where it says; the cut hides the jump
                let start = motion.start_pose();
                self.state.position = start.position;
                self.state.look_at = start.look_at;
                self.state.fov = start.fov;
                Mode::Motion {
                    motion,
                    duration: duration.max(1e-3),
                    elapsed: 0.0,
                }
            }
        };
    }

    /// Jump straight to a shot's final pose
    pub fn snap(&mut self, shot: &Shot) {
        let pose = shot.motion.end_pose();
        self.state = CameraState {
            position: pose.position,
            look_at: pose.look_at,
            fov: pose.fov,
            roll: shot.roll,
        };
        self.target_roll = shot.roll;
        self.mode = Mode::Static {
            target: pose,
            speed: shot.lerp_speed,
        };
    }

    pub fn update(&mut self, dt: f32) -> CameraState {
        match &mut self.mode {
            Mode::Idle => {}
            Mode::Static { target, speed } => {
                self.state.position = self.state.position.damp(&target.position, *speed, dt);
                self.state.look_at = self.state.look_at.damp(&target.look_at, *speed, dt);
                self.state.fov = damp(self.state.fov, target.fov, *speed, dt);
            }
            Mode::Motion {
                motion,
                duration,
                elapsed,
            } => {
                *elapsed = (*elapsed + dt).min(*duration);
                let t = ease_in_out_quintic(*elapsed / *duration);
                let pose = match motion {
                    ShotMotion::Static(pose) => *pose,
                    ShotMotion::Move { from, to, .. } => from.lerp(to, t),
                    ShotMotion::Orbit { orbit, .. } => orbit.pose_at(t),
                };
                self.state.position = pose.position;
                self.state.look_at = pose.look_at;
                self.state.fov = pose.fov;
            }
        }
        self.state.roll = damp_angle(self.state.roll, self.target_roll, self.config.roll_rate, dt);
        self.state
    }

    /// Whether a motion shot has reached its final pose
    pub fn motion_finished(&self) -> bool {
        match self.mode {
            Mode::Motion {
                duration, elapsed, ..
            } => elapsed >= duration,
            _ => true,
        }
    }
}

impl Default for CameraAnimator {
    fn default() -> Self {
        Self::new(AnimatorConfig::default())
    }
}
