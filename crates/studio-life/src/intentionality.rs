//! Intentionality - conversational micro-motion
//!
//! Two smoothed weights describe what an avatar is doing in the
//! conversation: speaking and listening. They drive:
//!
//! - micro-glances: small yaw jitter re-rolled every few seconds
//! - acknowledgment pulses: short nods at random intervals while listening
//! - speech sway and lean while speaking
//! - a synthetic mouth-open value while speaking
//!
//! The body signal is spread over spine, chest, neck and head with
//! decreasing magnitude, each clamped to a small maximum. Everything except
//! the mouth is damped while walking so it does not fight the walk cycle.

use std::f32::consts::TAU;

use serde::Deserialize;
use studio_core::{damp, triangle_pulse, Euler, PeerId, SceneTime};

use crate::PeerRng;

/// Role in the conversation for the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Idle,
    Speaking,
    Listening,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntentionalityConfig {
    /// Rate (1/s) at which the speaking weight approaches its target
    pub speaking_attack: f32,
    pub speaking_release: f32,
    /// Listening reacts slower than speaking
    pub listening_attack: f32,
    pub listening_release: f32,

    pub glance_min_interval: f32,
    pub glance_max_interval: f32,
    /// Maximum glance yaw (radians)
    pub glance_amplitude: f32,
    pub glance_rate: f32,

    pub ack_min_interval: f32,
    pub ack_max_interval: f32,
    pub ack_duration: f32,
    /// Nod pitch at the peak of an acknowledgment (radians)
    pub ack_amplitude: f32,

    /// Speech sway yaw amplitude (radians)
    pub speech_sway: f32,
    /// Forward lean while speaking (radians)
    pub speech_lean: f32,

    /// Share of the signal taken by spine, chest, neck, head
    pub distribution: [f32; 4],
    /// Per-bone clamp, same order
    pub limits: [f32; 4],

    /// Multiplier applied to body signals while walking
    pub walking_damping: f32,

    /// Mouth beat frequencies (Hz)
    pub mouth_beats: [f32; 2],
    /// How long an explicit mouth value overrides the synthetic one
    pub mouth_override_secs: f32,
}

impl Default for IntentionalityConfig {
    fn default() -> Self {
        Self {
            speaking_attack: 6.0,
            speaking_release: 2.5,
            listening_attack: 2.0,
            listening_release: 1.5,
            glance_min_interval: 1.3,
            glance_max_interval: 5.0,
            glance_amplitude: 0.12,
            glance_rate: 3.0,
            ack_min_interval: 2.8,
            ack_max_interval: 7.6,
            ack_duration: 0.6,
            ack_amplitude: 0.14,
            speech_sway: 0.05,
            speech_lean: 0.03,
            distribution: [0.4, 0.3, 0.2, 0.1],
            limits: [0.06, 0.05, 0.04, 0.03],
            walking_damping: 0.2,
            mouth_beats: [3.1, 5.3],
            mouth_override_secs: 0.25,
        }
    }
}

impl IntentionalityConfig {
    /// Calmer preset for formal settings (panels, interviews)
    pub fn reserved() -> Self {
        Self {
            glance_amplitude: 0.06,
            ack_amplitude: 0.08,
            speech_sway: 0.025,
            ..Self::default()
        }
    }
}

/// Body offsets produced for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Posture {
    pub spine: Euler,
    pub chest: Euler,
    pub neck: Euler,
    pub head: Euler,
}

impl Posture {
    fn spread(signal: Euler, config: &IntentionalityConfig) -> Self {
        let part = |i: usize| signal.scale(config.distribution[i]).clamp_abs(config.limits[i]);
        Posture {
            spine: part(0),
            chest: part(1),
            neck: part(2),
            head: part(3),
        }
    }

    pub fn scale(&self, s: f32) -> Posture {
        Posture {
            spine: self.spine.scale(s),
            chest: self.chest.scale(s),
            neck: self.neck.scale(s),
            head: self.head.scale(s),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntentFrame {
    pub posture: Posture,
    /// 0 closed .. 1 open
    pub mouth: f32,
    pub speaking_weight: f32,
    pub listening_weight: f32,
}

const GLANCE_SALT: u32 = 0x6A4C_E000;

#[derive(Debug, Clone)]
pub struct Intentionality {
    rng: PeerRng,
    phase: f32,
    speaking: f32,
    listening: f32,
    next_glance_at: SceneTime,
    glance_target: f32,
    glance: f32,
    next_ack_at: SceneTime,
    ack_started: Option<SceneTime>,
    mouth_override: Option<(f32, SceneTime)>,
}

impl Intentionality {
    pub fn new(peer: &PeerId, now: SceneTime, config: &IntentionalityConfig) -> Self {
        let mut rng = PeerRng::for_peer(peer, GLANCE_SALT);
        let first_glance = rng.range(config.glance_min_interval, config.glance_max_interval);
        let first_ack = rng.range(config.ack_min_interval, config.ack_max_interval);
        Self {
            rng,
            phase: peer.phase_offset(),
            speaking: 0.0,
            listening: 0.0,
            next_glance_at: now.add_secs(first_glance),
            glance_target: 0.0,
            glance: 0.0,
            next_ack_at: now.add_secs(first_ack),
            ack_started: None,
            mouth_override: None,
        }
    }

    pub fn speaking_weight(&self) -> f32 {
        self.speaking
    }

    pub fn listening_weight(&self) -> f32 {
        self.listening
    }

    /// Use `value` as the mouth opening for the override window
    pub fn set_mouth(&mut self, value: f32, now: SceneTime, config: &IntentionalityConfig) {
        let until = now.add_secs(config.mouth_override_secs);
        self.mouth_override = Some((value.clamp(0.0, 1.0), until));
    }

    pub fn update(
        &mut self,
        role: Role,
        walking: bool,
        now: SceneTime,
        dt: f32,
        config: &IntentionalityConfig,
    ) -> IntentFrame {
        self.update_weights(role, dt, config);

        // Micro-glances
        if now >= self.next_glance_at {
            self.glance_target = self.rng.signed(config.glance_amplitude);
            let wait = self
                .rng
                .range(config.glance_min_interval, config.glance_max_interval);
            self.next_glance_at = now.add_secs(wait);
        }
        self.glance = damp(self.glance, self.glance_target, config.glance_rate, dt);

        // Acknowledgment pulses, only scheduled while listening
        let mut nod = 0.0;
        if let Some(start) = self.ack_started {
            let t = now.secs_since(start) / config.ack_duration.max(1e-3);
            if t >= 1.0 {
                self.ack_started = None;
            } else {
                nod = triangle_pulse(t) * config.ack_amplitude * self.listening;
            }
        } else if now >= self.next_ack_at {
            if role == Role::Listening {
                self.ack_started = Some(now);
            }
            let wait = self.rng.range(config.ack_min_interval, config.ack_max_interval);
            self.next_ack_at = now.add_secs(wait);
        }

        // Speech sway and lean
        let t = now.as_secs_f64();
        let sway = (((t * 0.9).fract() as f32) * TAU + self.phase).sin()
            * config.speech_sway
            * self.speaking;
        let lean = config.speech_lean * self.speaking;

        let signal = Euler::new(nod + lean, self.glance + sway, 0.0);
        let mut posture = Posture::spread(signal, config);
        let mut mouth = self.mouth(now, config);
        if walking {
            posture = posture.scale(config.walking_damping);
            mouth *= config.walking_damping;
        }

        IntentFrame {
            posture,
            mouth,
            speaking_weight: self.speaking,
            listening_weight: self.listening,
        }
    }

    fn update_weights(&mut self, role: Role, dt: f32, config: &IntentionalityConfig) {
        let (speak_target, listen_target) = match role {
            Role::Speaking => (1.0, 0.0),
            Role::Listening => (0.0, 1.0),
            Role::Idle => (0.0, 0.0),
        };
        let speak_rate = if speak_target > self.speaking {
            config.speaking_attack
        } else {
            config.speaking_release
        };
        let listen_rate = if listen_target > self.listening {
            config.listening_attack
        } else {
            config.listening_release
        };
        self.speaking = damp(self.speaking, speak_target, speak_rate, dt).clamp(0.0, 1.0);
        self.listening = damp(self.listening, listen_target, listen_rate, dt).clamp(0.0, 1.0);

        // The role being left yields to the role being entered
        if self.speaking + self.listening > 1.0 {
            match role {
                Role::Listening => self.speaking = 1.0 - self.listening,
                _ => self.listening = 1.0 - self.speaking,
            }
        }
    }

    fn mouth(&mut self, now: SceneTime, config: &IntentionalityConfig) -> f32 {
        if let Some((value, until)) = self.mouth_override {
            if now < until {
                return value;
            }
            self.mouth_override = None;
        }
        if self.speaking <= 1e-3 {
            return 0.0;
        }

        let t = now.as_secs_f64();
        let beat = |hz: f32, offset: f32| {
            let cycles = (t * f64::from(hz)).fract() as f32;
            (cycles * TAU + offset).sin() * 0.5 + 0.5
        };
        let open = beat(config.mouth_beats[0], self.phase) * 0.6
            + beat(config.mouth_beats[1], self.phase * 1.7) * 0.4;
        (open * self.speaking).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn run(
        intent: &mut Intentionality,
        role: Role,
        walking: bool,
        start: SceneTime,
        secs: f32,
        config: &IntentionalityConfig,
    ) -> (SceneTime, Vec<IntentFrame>) {
        let mut now = start;
        let mut frames = Vec::new();
        for _ in 0..(secs / DT) as usize {
            now = now.add_secs(DT);
            frames.push(intent.update(role, walking, now, DT, config));
        }
        (now, frames)
    }

    #[test]
    fn test_speaking_attacks_faster_than_listening() {
        let config = IntentionalityConfig::default();
        let mut speaker = Intentionality::new(&PeerId::from("a"), SceneTime::ZERO, &config);
        let mut listener = Intentionality::new(&PeerId::from("b"), SceneTime::ZERO, &config);

        run(&mut speaker, Role::Speaking, false, SceneTime::ZERO, 0.3, &config);
        run(&mut listener, Role::Listening, false, SceneTime::ZERO, 0.3, &config);
        assert!(speaker.speaking_weight() > listener.listening_weight());
    }

    #[test]
    fn test_weights_never_sum_above_one() {
        let config = IntentionalityConfig::default();
        let mut intent = Intentionality::new(&PeerId::from("a"), SceneTime::ZERO, &config);

        let mut now = SceneTime::ZERO;
        for role in [Role::Speaking, Role::Listening, Role::Speaking, Role::Idle] {
            let (end, frames) = run(&mut intent, role, false, now, 1.5, &config);
            for f in frames {
                assert!(f.speaking_weight + f.listening_weight <= 1.0 + 1e-5);
            }
            now = end;
        }
    }

    #[test]
    fn test_posture_clamped_and_ordered() {
        let config = IntentionalityConfig::default();
        let mut intent = Intentionality::new(&PeerId::from("a"), SceneTime::ZERO, &config);
        let (_, frames) = run(&mut intent, Role::Listening, false, SceneTime::ZERO, 20.0, &config);

        for f in frames {
            let p = f.posture;
            for (e, limit) in [p.spine, p.chest, p.neck, p.head].iter().zip(config.limits) {
                assert!(e.x.abs() <= limit + 1e-6 && e.y.abs() <= limit + 1e-6);
            }
            assert!(p.spine.y.abs() + 1e-6 >= p.head.y.abs());
        }
    }

    #[test]
    fn test_listener_nods() {
        let config = IntentionalityConfig::default();
        let mut intent = Intentionality::new(&PeerId::from("a"), SceneTime::ZERO, &config);
        let (_, frames) = run(&mut intent, Role::Listening, false, SceneTime::ZERO, 20.0, &config);
        let nodded = frames.iter().any(|f| f.posture.spine.x > 1e-3);
        assert!(nodded);
    }

    #[test]
    fn test_idle_never_nods_or_talks() {
        let config = IntentionalityConfig::default();
        let mut intent = Intentionality::new(&PeerId::from("a"), SceneTime::ZERO, &config);
        let (_, frames) = run(&mut intent, Role::Idle, false, SceneTime::ZERO, 20.0, &config);
        for f in frames {
            assert_eq!(f.posture.spine.x, 0.0);
            assert_eq!(f.mouth, 0.0);
        }
    }

    #[test]
    fn test_synthetic_mouth_moves_while_speaking() {
        let config = IntentionalityConfig::default();
        let mut intent = Intentionality::new(&PeerId::from("a"), SceneTime::ZERO, &config);
        let (_, frames) = run(&mut intent, Role::Speaking, false, SceneTime::ZERO, 2.0, &config);

        let tail = &frames[frames.len() - 60..];
        let min = tail.iter().map(|f| f.mouth).fold(1.0, f32::min);
        let max = tail.iter().map(|f| f.mouth).fold(0.0, f32::max);
        assert!(max - min > 0.2, "mouth range {}..{}", min, max);
    }

    #[test]
    fn test_mouth_override_window() {
        let config = IntentionalityConfig::default();
        let mut intent = Intentionality::new(&PeerId::from("a"), SceneTime::ZERO, &config);
        let now = SceneTime::from_millis(1_000);
        intent.set_mouth(0.8, now, &config);

        let f = intent.update(Role::Idle, false, now.add_secs(0.1), DT, &config);
        assert_eq!(f.mouth, 0.8);
        let f = intent.update(Role::Idle, false, now.add_secs(0.3), DT, &config);
        assert_eq!(f.mouth, 0.0);
    }

    #[test]
    fn test_walking_damps_body() {
        let config = IntentionalityConfig::default();
        let peer = PeerId::from("a");
        let mut still = Intentionality::new(&peer, SceneTime::ZERO, &config);
        let mut walking = Intentionality::new(&peer, SceneTime::ZERO, &config);

        let (_, a) = run(&mut still, Role::Speaking, false, SceneTime::ZERO, 3.0, &config);
        let (_, b) = run(&mut walking, Role::Speaking, true, SceneTime::ZERO, 3.0, &config);
        let energy = |frames: &[IntentFrame]| -> f32 {
            frames.iter().map(|f| f.posture.spine.y.abs() + f.posture.spine.x.abs()).sum()
        };
        assert!(energy(&b) < energy(&a));
    }

    #[test]
    fn test_walking_damps_mouth() {
        let config = IntentionalityConfig::default();
        let peer = PeerId::from("a");
        let mut still = Intentionality::new(&peer, SceneTime::ZERO, &config);
        let mut walking = Intentionality::new(&peer, SceneTime::ZERO, &config);

        let (_, a) = run(&mut still, Role::Speaking, false, SceneTime::ZERO, 2.0, &config);
        let (_, b) = run(&mut walking, Role::Speaking, true, SceneTime::ZERO, 2.0, &config);
        let peak = |frames: &[IntentFrame]| frames.iter().map(|f| f.mouth).fold(0.0, f32::max);
        assert!(peak(&a) > 0.2);
        assert!(peak(&b) <= peak(&a) * config.walking_damping + 1e-5);
        for (s, w) in a.iter().zip(&b) {
            assert!(w.mouth <= s.mouth + 1e-6);
        }
    }
}
