//! Gaffer - three-point lighting that follows the conversation

use std::f32::consts::TAU;

use serde::Deserialize;
use studio_core::{damp, SceneTime, Vec3};

/// Light color in linear RGB (0.0 - 1.0)
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn white() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub intensity: f32,
    pub target_intensity: f32,
    pub color: Color,
}

impl Light {
    fn new(intensity: f32, color: Color) -> Self {
        Self {
            intensity,
            target_intensity: intensity,
            color,
        }
    }
}

/// Key, fill and rim, plus where the key currently sits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub key: Light,
    pub fill: Light,
    pub rim: Light,
    pub key_position: Vec3,
    pub key_target_position: Vec3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GafferConfig {
    pub key_intensity: f32,
    pub fill_intensity: f32,
    pub rim_intensity: f32,
    /// Key gain while someone speaks
    pub speaking_key_gain: f32,
    /// Fill drops while speaking for more contrast on the speaker
    pub speaking_fill_gain: f32,
    pub speaking_rim_gain: f32,
    /// Key light offset from its aim point
    pub key_offset: Vec3,
    /// 0 keeps the key on the group, 1 puts it fully on the speaker
    pub speaker_bias: f32,
    pub pulse_hz: f32,
    /// Relative intensity swing of the speaking pulse
    pub pulse_depth: f32,
    /// Exponential blend rate (1/s)
    pub blend_rate: f32,
    pub key_color: Color,
    pub fill_color: Color,
    pub rim_color: Color,
}

impl Default for GafferConfig {
    fn default() -> Self {
        Self {
            key_intensity: 1.0,
            fill_intensity: 0.45,
            rim_intensity: 0.6,
            speaking_key_gain: 1.15,
            speaking_fill_gain: 0.85,
            speaking_rim_gain: 1.1,
            key_offset: Vec3::new(1.8, 2.6, 2.2),
            speaker_bias: 0.6,
            pulse_hz: 0.35,
            pulse_depth: 0.04,
            blend_rate: 1.5,
            key_color: Color::new(1.0, 0.95, 0.88),
            fill_color: Color::new(0.85, 0.9, 1.0),
            rim_color: Color::white(),
        }
    }
}

pub struct Gaffer {
    config: GafferConfig,
    rig: LightRig,
}

impl Gaffer {
    pub fn new(config: GafferConfig) -> Self {
        let key_position = config.key_offset;
        let rig = LightRig {
            key: Light::new(config.key_intensity, config.key_color),
            fill: Light::new(config.fill_intensity, config.fill_color),
            rim: Light::new(config.rim_intensity, config.rim_color),
            key_position,
            key_target_position: key_position,
        };
        Self { config, rig }
    }

    pub fn rig(&self) -> &LightRig {
        &self.rig
    }

    /// Recompute targets from the scene and blend toward them
    pub fn update(
        &mut self,
        now: SceneTime,
        dt: f32,
        group_center: Vec3,
        speaker: Option<Vec3>,
    ) -> LightRig {
        let c = &self.config;

        let aim = match speaker {
            Some(s) => group_center.lerp(&s, c.speaker_bias),
            None => group_center,
        };
        self.rig.key_target_position = aim.with_y(0.0) + c.key_offset;

        let (key, fill, rim) = match speaker {
            Some(_) => {
                let cycles = (now.as_secs_f64() * f64::from(c.pulse_hz)).fract() as f32;
                let pulse = 1.0 + (cycles * TAU).sin() * c.pulse_depth;
                (
                    c.key_intensity * c.speaking_key_gain * pulse,
                    c.fill_intensity * c.speaking_fill_gain,
                    c.rim_intensity * c.speaking_rim_gain,
                )
            }
            None => (c.key_intensity, c.fill_intensity, c.rim_intensity),
        };
        self.rig.key.target_intensity = key;
        self.rig.fill.target_intensity = fill;
        self.rig.rim.target_intensity = rim;

        let rate = c.blend_rate;
        self.rig.key_position = self
            .rig
            .key_position
            .damp(&self.rig.key_target_position, rate, dt);
        for light in [&mut self.rig.key, &mut self.rig.fill, &mut self.rig.rim] {
            light.intensity = damp(light.intensity, light.target_intensity, rate, dt);
        }
        self.rig
    }
}

impl Default for Gaffer {
    fn default() -> Self {
        Self::new(GafferConfig::default())
    }
}
