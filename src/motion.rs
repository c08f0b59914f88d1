/// Interval between driver position writes while a speed is held.
const UPDATE_INTERVAL: f32 = 0.05;

/// Relative position deltas produced by one integration step.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct MotionDelta {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
    pub focus: f64,
}

/// Turns held-speed commands into discrete relative moves on a fixed 50 ms
/// cadence. Ticks arrive at the host frame rate, so this acts as a rate
/// limiter: sub-threshold ticks only accumulate elapsed time.
#[derive(Debug, Default)]
pub struct MotionIntegrator {
    pan_speed: f64,
    tilt_speed: f64,
    zoom_speed: f64,
    focus_speed: f64,
    elapsed: f32,
}

impl MotionIntegrator {
    pub fn set_pantilt_speed(&mut self, pan: f64, tilt: f64) {
        self.pan_speed = pan.clamp(-1.0, 1.0);
        self.tilt_speed = tilt.clamp(-1.0, 1.0);
    }

    pub fn set_zoom_speed(&mut self, speed: f64) {
        self.zoom_speed = speed.clamp(-1.0, 1.0);
    }

    pub fn set_focus_speed(&mut self, speed: f64) {
        self.focus_speed = speed.clamp(-1.0, 1.0);
    }

    pub fn has_motion(&self) -> bool {
        self.pan_speed != 0.0
            || self.tilt_speed != 0.0
            || self.zoom_speed != 0.0
            || self.focus_speed != 0.0
    }

    /// Accumulate elapsed time; once the update interval is reached, emit
    /// `speed * accumulated` per axis and reset the accumulator. The reset
    /// also happens when every speed is zero so the accumulator cannot grow
    /// without bound on an idle device.
    pub fn tick(&mut self, seconds: f32) -> Option<MotionDelta> {
        self.elapsed += seconds;
        if self.elapsed < UPDATE_INTERVAL {
            return None;
        }
        let dt = self.elapsed as f64;
        self.elapsed = 0.0;
        if !self.has_motion() {
            return None;
        }
        Some(MotionDelta {
            pan: self.pan_speed * dt,
            tilt: self.tilt_speed * dt,
            zoom: self.zoom_speed * dt,
            focus: self.focus_speed * dt,
        })
    }
}

#[test]
fn test_subthreshold_ticks_accumulate_into_one_update() {
    let mut m = MotionIntegrator::default();
    m.set_pantilt_speed(1.0, 0.0);
    assert_eq!(m.tick(0.02), None);
    assert_eq!(m.tick(0.02), None);
    let delta = m.tick(0.02).unwrap();
    assert!((delta.pan - 0.06).abs() < 1e-6);
    assert_eq!(delta.tilt, 0.0);
    // the accumulator was reset, not carried
    assert_eq!(m.tick(0.02), None);
}

#[test]
fn test_zero_speed_resets_without_emitting() {
    let mut m = MotionIntegrator::default();
    assert_eq!(m.tick(0.06), None);
    m.set_pantilt_speed(0.5, -0.5);
    // a fresh accumulation window starts here
    assert_eq!(m.tick(0.03), None);
    let delta = m.tick(0.03).unwrap();
    assert!((delta.pan - 0.03).abs() < 1e-6);
    assert!((delta.tilt + 0.03).abs() < 1e-6);
}

#[test]
fn test_axes_integrate_independently() {
    let mut m = MotionIntegrator::default();
    m.set_zoom_speed(1.0);
    m.set_focus_speed(-0.5);
    let delta = m.tick(0.1).unwrap();
    assert_eq!(delta.pan, 0.0);
    assert!((delta.zoom - 0.1).abs() < 1e-6);
    assert!((delta.focus + 0.05).abs() < 1e-6);
}

#[test]
fn test_speeds_are_clamped() {
    let mut m = MotionIntegrator::default();
    m.set_pantilt_speed(4.0, -4.0);
    let delta = m.tick(0.05).unwrap();
    assert!((delta.pan - 0.05).abs() < 1e-6);
    assert!((delta.tilt + 0.05).abs() < 1e-6);
}
