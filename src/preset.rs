use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::position::PtzPosition;

/// One saved preset in its persisted form, as stored in the device entry of
/// the config file. White-balance fields are carried for drivers that expose
/// them and default harmlessly for the rest.
#[derive(Deserialize, Serialize, Debug, Copy, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PresetRecord {
    pub preset_id: i32,
    #[serde(flatten)]
    pub position: PtzPosition,
}

/// Preset memory for one device: an open integer keyspace mapping preset id
/// to a position snapshot. Any id restrictions (a UI offering slots 1-9, say)
/// are the caller's concern.
#[derive(Debug, Default)]
pub struct PresetStore {
    presets: IndexMap<i32, PtzPosition>,
}

impl PresetStore {
    pub fn from_records(records: &[PresetRecord]) -> Self {
        PresetStore {
            presets: records.iter().map(|r| (r.preset_id, r.position)).collect(),
        }
    }

    pub fn to_records(&self) -> Vec<PresetRecord> {
        self.presets
            .iter()
            .map(|(&preset_id, &position)| PresetRecord {
                preset_id,
                position,
            })
            .collect()
    }

    /// Unconditional upsert: overwrites any preset already stored at `id`.
    pub fn set(&mut self, id: i32, position: PtzPosition) {
        self.presets.insert(id, position);
    }

    /// Removing an absent id is a no-op, not an error.
    pub fn remove(&mut self, id: i32) {
        self.presets.shift_remove(&id);
    }

    pub fn recall(&self, id: i32) -> Option<&PtzPosition> {
        self.presets.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

#[test]
fn test_set_overwrites_and_recall_returns_snapshot() {
    let mut store = PresetStore::default();
    let mut pos = PtzPosition::default();
    pos.set_pantilt(0.3, 0.4);
    store.set(3, pos);

    // mutating afterwards must not affect the stored snapshot
    pos.set_pantilt(-0.9, 0.0);
    assert_eq!(store.recall(3).unwrap().pan, 0.3);

    store.set(3, pos);
    assert_eq!(store.recall(3).unwrap().pan, -0.9);
}

#[test]
fn test_remove_and_recall_absent_are_noops() {
    let mut store = PresetStore::default();
    store.remove(7);
    assert!(store.recall(7).is_none());
    store.set(7, PtzPosition::default());
    store.remove(7);
    assert!(store.recall(7).is_none());
}

#[test]
fn test_records_round_trip_preserves_focus_auto() {
    let mut store = PresetStore::default();
    let mut pos = PtzPosition::default();
    pos.set_autofocus(false);
    pos.set_focus(0.6);
    store.set(1, pos);
    store.set(5, PtzPosition::default());

    let records = store.to_records();
    let restored = PresetStore::from_records(&records);
    let back = restored.recall(1).unwrap();
    assert!(!back.focus_auto);
    assert_eq!(back.focus, 0.6);
    assert!(restored.recall(5).unwrap().focus_auto);
}
