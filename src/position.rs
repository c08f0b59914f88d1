use serde::{Deserialize, Serialize};

/// Normalized camera position. Pan and tilt live in [-1, 1] with 0 at
/// center; zoom and focus live in [0, 1]. The manual focus value is ignored
/// by drivers while `focus_auto` is set.
///
/// White balance is an optional extension: only some drivers consume it, the
/// rest leave the fields untouched.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PtzPosition {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
    pub focus_auto: bool,
    pub focus: f64,
    #[serde(default = "default_true")]
    pub white_bal_auto: bool,
    #[serde(default)]
    pub temperature: i32,
}

fn default_true() -> bool {
    true
}

impl Default for PtzPosition {
    fn default() -> Self {
        PtzPosition {
            pan: 0.0,
            tilt: 0.0,
            zoom: 0.0,
            focus_auto: true,
            focus: 0.0,
            white_bal_auto: true,
            temperature: 0,
        }
    }
}

impl PtzPosition {
    pub fn set_pantilt(&mut self, pan: f64, tilt: f64) {
        self.pan = pan.clamp(-1.0, 1.0);
        self.tilt = tilt.clamp(-1.0, 1.0);
    }

    /// Add a delta to the current pan/tilt, then clamp. Clamping after the
    /// add makes repeated relative moves saturate at the boundary instead of
    /// drifting past it.
    pub fn pantilt_rel(&mut self, dp: f64, dt: f64) {
        self.set_pantilt(self.pan + dp, self.tilt + dt);
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(0.0, 1.0);
    }

    pub fn set_focus(&mut self, focus: f64) {
        self.focus = focus.clamp(0.0, 1.0);
    }

    pub fn set_autofocus(&mut self, enabled: bool) {
        self.focus_auto = enabled;
    }

    pub fn set_whitebal(&mut self, auto: bool, temperature: i32) {
        self.white_bal_auto = auto;
        self.temperature = temperature;
    }
}

#[test]
fn test_absolute_setters_clamp() {
    let mut pos = PtzPosition::default();
    pos.set_pantilt(5.0, -3.0);
    assert_eq!(pos.pan, 1.0);
    assert_eq!(pos.tilt, -1.0);
    pos.set_zoom(1.5);
    assert_eq!(pos.zoom, 1.0);
    pos.set_focus(-0.2);
    assert_eq!(pos.focus, 0.0);
}

#[test]
fn test_relative_moves_saturate() {
    let mut pos = PtzPosition::default();
    pos.set_pantilt(0.95, 0.0);
    for _ in 0..5 {
        pos.pantilt_rel(0.1, 0.0);
        assert!(pos.pan <= 1.0);
    }
    assert_eq!(pos.pan, 1.0);
    // moving away from the boundary works again immediately
    pos.pantilt_rel(-0.1, 0.0);
    assert!((pos.pan - 0.9).abs() < 1e-12);
}

#[test]
fn test_preset_fields_survive_serde() {
    let mut pos = PtzPosition::default();
    pos.set_pantilt(0.25, -0.5);
    pos.set_autofocus(false);
    pos.set_focus(0.75);
    let json = serde_json::to_string(&pos).unwrap();
    let back: PtzPosition = serde_json::from_str(&json).unwrap();
    assert_eq!(back, pos);
}

#[test]
fn test_whitebal_fields_default_when_missing() {
    // configs written before the white-balance extension still load
    let json = r#"{"pan":0.0,"tilt":0.0,"zoom":0.5,"focusAuto":true,"focus":0.0}"#;
    let pos: PtzPosition = serde_json::from_str(json).unwrap();
    assert!(pos.white_bal_auto);
    assert_eq!(pos.temperature, 0);
}
