//! End-to-end scene properties
//!
//! Checkers over harness observations, and the scenarios that exercise them.

use studio_avatar::{measure_height, AvatarModel, AvatarRecord};

use crate::CutRecord;

/// Distance of the avatar's lowest rest-pose point from the floor
pub fn ground_error(record: &AvatarRecord) -> Option<f32> {
    record.lowest_world_point().map(f32::abs)
}

/// Standing height after normalization
pub fn normalized_height(record: &AvatarRecord, model: &AvatarModel, allowance: f32) -> Option<f32> {
    measure_height(model, allowance).map(|(h, _)| h * record.scale)
}

/// Number of adjacent cut pairs with the same shot type
pub fn consecutive_repeats(cuts: &[CutRecord]) -> usize {
    cuts.windows(2).filter(|w| w[0].kind == w[1].kind).count()
}

/// Shortest time between adjacent cuts where the later one is in the given
/// context
pub fn min_gap(cuts: &[CutRecord], speaking: bool) -> Option<f32> {
    cuts.windows(2)
        .filter(|w| w[1].speaking == speaking)
        .map(|w| w[1].at.secs_since(w[0].at))
        .reduce(f32::min)
}

/// Whether a blink trace only moves in bounded steps, stays in 0..=1 and
/// rests at zero between blinks
pub fn is_blink_trace(trace: &[f32], max_step: f32) -> bool {
    let bounded = trace.iter().all(|v| (0.0..=1.0).contains(v));
    let smooth = trace.windows(2).all(|w| (w[1] - w[0]).abs() <= max_step);
    let rests = trace.iter().any(|v| *v == 0.0);
    bounded && smooth && rests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bounds_only, random_cast, MockAssets, StudioHarness};
    use studio_avatar::{Bone, REACTIVE_FADE};
    use studio_camera::DirectorConfig;
    use studio_core::{PeerId, Vec3};
    use studio_runtime::{EnvironmentCall, StudioConfig};
    use studio_wire::{InboundMessage, OutboundMessage};

    const EPS: f32 = 1e-3;

    fn harness() -> StudioHarness {
        StudioHarness::new(StudioConfig::default()).unwrap()
    }

    fn two_avatars() -> StudioHarness {
        let mut h = harness();
        h.load("a", "avatars/a.vrm");
        h.load("b", "avatars/b.vrm");
        h.settle();
        h
    }

    fn peer(id: &str) -> PeerId {
        PeerId::new(id)
    }

    #[test]
    fn test_avatars_grounded_at_target_height() {
        let config = StudioConfig::default();
        let target = config.registry.target_height;
        let allowance = config.registry.head_top_allowance;

        let assets = MockAssets::new();
        let cast = random_cast(42, 5);
        for model in &cast {
            assets.insert_model(model.clone());
        }
        let mut h = StudioHarness::with_assets(config, assets).unwrap();
        for (i, model) in cast.iter().enumerate() {
            h.load(&format!("p{}", i), &model.url);
        }
        h.settle();

        assert_eq!(h.director().registry().len(), cast.len());
        for (i, model) in cast.iter().enumerate() {
            let record = h.director().registry().get(&peer(&format!("p{}", i))).unwrap();
            assert!(ground_error(record).unwrap() < EPS, "{} floats", model.url);
            let height = normalized_height(record, model, allowance).unwrap();
            assert!((height - target).abs() < EPS, "{} is {}", model.url, height);
        }
    }

    #[test]
    fn test_bounds_fallback_grounds_mesh() {
        let config = StudioConfig::default();
        let target = config.registry.target_height;
        let model = bounds_only("avatars/statue.glb", -0.4, 3.0);
        let assets = MockAssets::new();
        assets.insert_model(model.clone());

        let mut h = StudioHarness::with_assets(config, assets).unwrap();
        h.load("s", &model.url);
        h.settle();

        let record = h.director().registry().get(&peer("s")).unwrap();
        let bounds = model.bounds.unwrap();
        assert!((bounds.height() * record.scale - target).abs() < EPS);
        assert!((bounds.min.y * record.scale + record.ground_offset).abs() < EPS);
    }

    #[test]
    fn test_movement_progress_and_arrival() {
        let mut h = harness();
        h.load("a", "avatars/a.vrm");
        h.settle();

        let target = Vec3::new(2.0, 0.0, 1.5);
        h.move_to("a", target);

        let mut last = 0.0;
        let mut frames = 0;
        loop {
            h.step();
            frames += 1;
            match h.director().movement().get(&peer("a")) {
                Some(m) => {
                    assert!(m.progress >= last, "progress went backwards");
                    assert!(m.progress <= 1.0);
                    last = m.progress;
                }
                None => break,
            }
            assert!(frames < 60 * 30, "never arrived");
        }

        let avatar = h.director().registry().get(&peer("a")).unwrap();
        assert_eq!(avatar.position, target);
        assert_eq!(avatar.home, target);
        assert!(!h.director().movement().is_moving(&peer("a")));
    }

    #[test]
    fn test_walk_faces_travel_then_viewer() {
        let mut h = harness();
        h.load("a", "avatars/a.vrm");
        h.settle();
        let start = h.director().registry().get(&peer("a")).unwrap().position;

        h.move_to("a", start + Vec3::new(3.0, 0.0, 0.0));
        h.advance(0.5);
        let walking = h.director().registry().get(&peer("a")).unwrap();
        assert!((walking.yaw - std::f32::consts::FRAC_PI_2).abs() < EPS);
        assert_eq!(
            walking.mixer.active_url(),
            Some(h.director().config().library.walk.as_str())
        );

        h.advance(4.0);
        let arrived = h.director().registry().get(&peer("a")).unwrap();
        assert!(arrived.yaw.abs() < 0.05);
        assert_ne!(
            arrived.mixer.active_url(),
            Some(h.director().config().library.walk.as_str())
        );
    }

    #[test]
    fn test_blink_is_triangular_pulse() {
        let mut h = harness();
        h.load("a", "avatars/a.vrm");
        h.settle();

        let mut trace = Vec::new();
        for _ in 0..(60 * 20) {
            h.step();
            trace.push(h.scene().pose("a").unwrap().blink);
        }

        let duration = StudioConfig::default().life.blink.duration;
        let max_step = 2.0 * h.frame_secs() / duration + EPS;
        assert!(is_blink_trace(&trace, max_step));
        assert!(trace.iter().cloned().fold(0.0, f32::max) > 0.8, "never fully closed");

        // 2-6 s apart over 20 s
        let starts = trace.windows(2).filter(|w| w[0] == 0.0 && w[1] > 0.0).count();
        assert!((3..=10).contains(&starts), "{} blinks", starts);
    }

    #[test]
    fn test_automatic_cuts_vary_and_respect_minimums() {
        let mut h = two_avatars();
        h.advance(90.0);
        h.speaking("a", true);
        h.advance(60.0);

        let cuts = h.cuts();
        assert!(cuts.len() >= 8, "only {} cuts", cuts.len());
        assert_eq!(consecutive_repeats(cuts), 0);

        let config = DirectorConfig::default();
        let frame = h.frame_secs();
        assert!(min_gap(cuts, false).unwrap() >= config.idle_min_interval - frame);
        assert!(min_gap(cuts, true).unwrap() >= config.speaking_min_interval - frame);
    }

    #[test]
    fn test_load_remove_load_leaves_one_clean_avatar() {
        let mut h = harness();
        h.load("p", "avatars/p.vrm");
        h.settle();
        h.remove("p");
        h.load("p", "avatars/p.vrm");
        h.settle();

        let d = h.director();
        assert_eq!(d.registry().len(), 1);
        assert_eq!(d.life().len(), 1);
        assert_eq!(d.registry().get(&peer("p")).unwrap().mixer.action_count(), 1);
        assert_eq!(h.scene().live.len(), 1);
        assert_eq!(h.scene().duplicate_adds, 0);
        assert_eq!(h.scene().orphan_removes, 0);
        let readies = h
            .outbound()
            .iter()
            .filter(|m| matches!(m, OutboundMessage::Ready { .. }))
            .count();
        assert_eq!(readies, 2);
    }

    #[test]
    fn test_remove_during_load_discards_result() {
        let mut h = harness();
        h.load("p", "avatars/p.vrm");
        let jobs = h.hold_jobs();
        h.remove("p");
        for job in jobs {
            h.resolve(job);
        }
        h.settle();

        assert!(h.director().registry().is_empty());
        assert!(h.scene().live.is_empty());
        assert!(h.outbound().is_empty());
    }

    #[test]
    fn test_speaking_turns_gaze_and_cuts() {
        let mut h = two_avatars();
        h.advance(1.0);
        let spoke_at = h.now();
        h.speaking("a", true);

        let gaze = h.director().gaze();
        assert_eq!(gaze.target(&peer("b")), Some(&peer("a")));
        assert_eq!(gaze.target(&peer("a")), Some(&peer("b")));

        let speaking_min = DirectorConfig::default().speaking_min_interval;
        h.advance(speaking_min + 0.1);
        let cut = h
            .cuts()
            .iter()
            .find(|c| c.at > spoke_at && c.speaking)
            .expect("no speaking cut");
        assert!(cut.at.secs_since(spoke_at) <= speaking_min + h.frame_secs());

        // a stands left of b; each turns toward the other, clamped
        let limit = StudioConfig::default().gaze.max_deviation;
        let a = h.director().registry().get(&peer("a")).unwrap();
        let b = h.director().registry().get(&peer("b")).unwrap();
        assert!((a.yaw - limit).abs() < 0.05, "a yaw {}", a.yaw);
        assert!((b.yaw + limit).abs() < 0.05, "b yaw {}", b.yaw);
    }

    #[test]
    fn test_bogus_shot_changes_nothing() {
        let mut h = two_avatars();
        h.advance(2.0);

        let shot_before = h.director().shots().current().copied();
        let cut_before = h.director().shots().last_cut_at();
        let camera_before = h.director().animator().state();
        let rejected_before = h.director().stats().rejected;

        h.send_json(r#"{"type":"set_camera_shot","shot":"bogus"}"#)
            .unwrap();

        assert_eq!(h.director().shots().current().copied(), shot_before);
        assert_eq!(h.director().shots().last_cut_at(), cut_before);
        assert_eq!(h.director().animator().state(), camera_before);
        assert_eq!(h.director().stats().rejected, rejected_before + 1);
        assert_eq!(h.director().shots().stats().rejected, 1);
    }

    #[test]
    fn test_second_quick_load_wins() {
        // Completions arrive in reverse order
        let mut h = harness();
        h.load("p", "avatars/first.vrm");
        h.load("p", "avatars/second.vrm");
        let mut jobs = h.hold_jobs();
        jobs.reverse();
        for job in jobs {
            h.resolve(job);
        }
        h.settle();

        let record = h.director().registry().get(&peer("p")).unwrap();
        assert_eq!(record.url, "avatars/second.vrm");
        assert_eq!(h.scene().live.get(&peer("p")).unwrap(), "avatars/second.vrm");
        assert!(h.scene().added.iter().all(|(_, url)| url != "avatars/first.vrm"));
    }

    #[test]
    fn test_reload_disposes_previous_avatar() {
        let mut h = harness();
        h.load("p", "avatars/first.vrm");
        h.settle();
        h.load("p", "avatars/second.vrm");
        h.settle();

        assert_eq!(h.director().registry().len(), 1);
        assert_eq!(h.scene().removed, vec![peer("p")]);
        assert_eq!(h.scene().live.get(&peer("p")).unwrap(), "avatars/second.vrm");
        assert_eq!(h.scene().duplicate_adds, 0);
    }

    #[test]
    fn test_failed_reload_keeps_previous_avatar() {
        let assets = MockAssets::new();
        assets.fail("avatars/broken.vrm");
        let mut h = StudioHarness::with_assets(StudioConfig::default(), assets).unwrap();
        h.load("p", "avatars/good.vrm");
        h.settle();
        h.load("p", "avatars/broken.vrm");
        h.settle();

        let record = h.director().registry().get(&peer("p")).unwrap();
        assert_eq!(record.url, "avatars/good.vrm");
        assert!(!h.director().registry().is_loading(&peer("p")));
        assert_eq!(h.scene().live.len(), 1);
    }

    #[test]
    fn test_emotion_cause_and_reactions_differ() {
        let mut h = two_avatars();
        h.send(InboundMessage::Emotion {
            peer: peer("a"),
            emotion: "happy".into(),
        });
        h.settle();
        h.advance(REACTIVE_FADE + 0.1);

        let library = h.director().config().library.clone();
        let a = h.director().registry().get(&peer("a")).unwrap();
        let b = h.director().registry().get(&peer("b")).unwrap();
        assert_eq!(a.mixer.active_url(), library.emotion_clip("happy"));
        assert_eq!(b.mixer.active_url(), library.reaction_clip("happy"));
        assert_ne!(a.mixer.active_url(), b.mixer.active_url());
        assert_eq!(a.emotion.as_deref(), Some("happy"));
    }

    #[test]
    fn test_clip_fetched_once_and_root_height_stripped() {
        let mut h = two_avatars();
        h.move_to("a", Vec3::new(-3.0, 0.0, 2.0));
        h.move_to("b", Vec3::new(3.0, 0.0, 2.0));
        h.settle();

        let walk = h.director().config().library.walk.clone();
        assert_eq!(h.assets().clip_fetches(&walk), 1);
        for id in ["a", "b"] {
            let avatar = h.director().registry().get(&peer(id)).unwrap();
            let action = avatar.mixer.active().unwrap();
            assert_eq!(action.url(), walk);
            assert!(!action.clip.has_root_motion());
            assert!(avatar
                .mixer
                .sample()
                .iter()
                .all(|s| s.bone != Bone::Hips));
        }
    }

    #[test]
    fn test_failed_clip_is_retried() {
        let config = StudioConfig::default();
        let url = config.library.emotion_clip("sad").unwrap().to_string();
        let assets = MockAssets::new();
        assets.fail(&url);
        let mut h = StudioHarness::with_assets(config, assets).unwrap();
        h.load("a", "avatars/a.vrm");
        h.settle();

        for _ in 0..2 {
            h.send(InboundMessage::Emotion {
                peer: peer("a"),
                emotion: "sad".into(),
            });
            h.settle();
        }
        assert_eq!(h.assets().clip_fetches(&url), 2);
        assert!(h.director().registry().contains(&peer("a")));
    }

    #[test]
    fn test_camera_room_and_backdrop_reach_collaborator() {
        let mut h = two_avatars();
        h.send_json(r##"{"type":"set_background","color":"#202020"}"##)
            .unwrap();
        h.send_json(r#"{"type":"set_camera_room","zone_center":{"x":40.0,"y":0.0,"z":0.0},"hdri":"loft.hdr"}"#)
            .unwrap();
        h.settle();

        let calls = h.backdrop().calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], EnvironmentCall::Background(_)));
        assert!(matches!(&calls[1], EnvironmentCall::Environment(p) if p.get_str("hdri") == Some("loft.hdr")));

        // Nobody stands in the new zone, so the camera frames an empty set
        assert!(h.director().framing_context().is_empty());
    }

    #[test]
    fn test_unknown_type_is_rejected_at_the_wire() {
        let mut h = harness();
        assert!(h.send_json(r#"{"type":"teleport","peer":"a"}"#).is_err());
        assert_eq!(h.director().stats().messages, 0);
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(6))]

        #[test]
        fn test_cut_variety_for_any_seed(seed in proptest::prelude::any::<u64>()) {
            let mut config = StudioConfig::default();
            config.director.seed = seed;
            let mut h = StudioHarness::new(config).unwrap();
            h.load("a", "avatars/a.vrm");
            h.load("b", "avatars/b.vrm");
            h.load("c", "avatars/c.vrm");
            h.settle();
            h.advance(60.0);

            proptest::prop_assert!(h.cuts().len() >= 4);
            proptest::prop_assert_eq!(consecutive_repeats(h.cuts()), 0);
        }
    }
}
