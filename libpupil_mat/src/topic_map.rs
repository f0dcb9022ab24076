use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pupil topic for the eye exported in the left diameter column
pub const DEFAULT_LEFT_TOPIC: &str = "pupil.0";
/// Pupil topic for the eye exported in the right diameter column
pub const DEFAULT_RIGHT_TOPIC: &str = "pupil.1";

/// Which of the two diameter columns a pupil measurement belongs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeSlot {
    Left,
    Right,
}

/// TopicMap assigns pupil topics to eye slots.
///
/// Only consulted when a gaze datum carries a single pupil measurement; with two
/// measurements the order of base_data decides. Topics that are not in the map go to the
/// right slot.
#[derive(Debug, Clone)]
pub struct TopicMap {
    map: FxHashMap<String, EyeSlot>,
}

impl Default for TopicMap {
    fn default() -> Self {
        Self::from_entries(&default_topic_slots())
    }
}

impl TopicMap {
    /// Build a map from topic/slot pairs, as they appear in the configuration
    pub fn from_entries(entries: &BTreeMap<String, EyeSlot>) -> Self {
        let mut map = FxHashMap::default();
        for (topic, slot) in entries {
            map.insert(topic.clone(), *slot);
        }
        Self { map }
    }

    pub fn slot_for(&self, topic: &str) -> EyeSlot {
        self.map.get(topic).copied().unwrap_or(EyeSlot::Right)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The stock Pupil Capture naming: eye process 0 is left, eye process 1 is right
pub fn default_topic_slots() -> BTreeMap<String, EyeSlot> {
    BTreeMap::from([
        (String::from(DEFAULT_LEFT_TOPIC), EyeSlot::Left),
        (String::from(DEFAULT_RIGHT_TOPIC), EyeSlot::Right),
    ])
}
