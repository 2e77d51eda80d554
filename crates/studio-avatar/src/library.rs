//! Clip library - which clip URL plays for which situation
//!
//! Emotion changes look up two tables: the cause table for the avatar that
//! expressed the emotion and the reaction table for everyone watching. The
//! tables are deliberately disjoint so a listener never mirrors the speaker.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClipLibrary {
    /// Walk cycle used by the movement controller
    pub walk: String,
    /// Idle used when nothing better is known
    pub generic_idle: String,
    /// Rotating idle pool handed out at load time
    pub idles: Vec<String>,
    /// emotion -> clip played on the avatar expressing it
    pub emotions: HashMap<String, String>,
    /// emotion -> clip played on avatars reacting to it
    pub reactions: HashMap<String, String>,
    /// gesture keyword -> one-shot clip
    pub gestures: HashMap<String, String>,
}

fn table(base: &str, entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), format!("{}/{}.fbx", base, v)))
        .collect()
}

impl Default for ClipLibrary {
    fn default() -> Self {
        ClipLibrary {
            walk: "animations/locomotion/walk.fbx".into(),
            generic_idle: "animations/idle/standing.fbx".into(),
            idles: vec![
                "animations/idle/standing.fbx".into(),
                "animations/idle/weight_shift.fbx".into(),
                "animations/idle/arms_crossed.fbx".into(),
                "animations/idle/hands_clasped.fbx".into(),
            ],
            emotions: table(
                "animations/emotion",
                &[
                    ("happy", "laughing"),
                    ("sad", "sigh"),
                    ("angry", "frustrated"),
                    ("surprised", "surprised"),
                    ("thinking", "thinking"),
                    ("excited", "excited"),
                ],
            ),
            reactions: table(
                "animations/reaction",
                &[
                    ("happy", "smile_nod"),
                    ("sad", "sympathetic"),
                    ("angry", "lean_back"),
                    ("surprised", "double_take"),
                    ("thinking", "attentive"),
                    ("excited", "clap_small"),
                ],
            ),
            gestures: table(
                "animations/gesture",
                &[
                    ("wave", "wave"),
                    ("nod", "nod"),
                    ("shake_head", "shake_head"),
                    ("shrug", "shrug"),
                    ("point", "point"),
                    ("bow", "bow"),
                    ("clap", "clap"),
                ],
            ),
        }
    }
}

impl ClipLibrary {
    /// Library with no emotion/gesture tables, only locomotion and idles
    pub fn minimal() -> Self {
        ClipLibrary {
            emotions: HashMap::new(),
            reactions: HashMap::new(),
            gestures: HashMap::new(),
            ..Self::default()
        }
    }

    pub fn emotion_clip(&self, emotion: &str) -> Option<&str> {
        self.emotions.get(&emotion.to_lowercase()).map(String::as_str)
    }

    pub fn reaction_clip(&self, emotion: &str) -> Option<&str> {
        self.reactions.get(&emotion.to_lowercase()).map(String::as_str)
    }

    pub fn gesture_clip(&self, gesture: &str) -> Option<&str> {
        self.gestures.get(&gesture.to_lowercase()).map(String::as_str)
    }

    /// The idle pool, or the generic idle if the pool is empty
    pub fn idle_pool(&self) -> Vec<&str> {
        if self.idles.is_empty() {
            vec![self.generic_idle.as_str()]
        } else {
            self.idles.iter().map(String::as_str).collect()
        }
    }
}
