use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::UvcConfig;
use crate::error::{DriverError, Result};

use super::DeviceDriver;

/// The camera controls this driver can address on a local device.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ControlId {
    Pan,
    Tilt,
    Zoom,
    Focus,
    FocusAuto,
    WhiteBalAuto,
    Temperature,
}

#[derive(Debug, Copy, Clone)]
pub struct ControlRange {
    pub min: i64,
    pub max: i64,
}

/// Control surface of one resolved local camera. `range` returns `None` for
/// controls the device does not expose.
pub trait CameraControls: Send + Sync {
    fn range(&self, control: ControlId) -> Option<ControlRange>;
    fn set(&self, control: ControlId, value: i64) -> std::io::Result<()>;
}

/// Name-to-camera lookup owned by the embedding application (a v4l2
/// enumerator, a DirectShow wrapper, a host object model). The driver
/// resolves through it on every call.
pub trait CameraControlHost: Send + Sync {
    fn resolve(&self, device: &str) -> Option<Arc<dyn CameraControls>>;
}

/// Passthrough driver for a local UVC-style camera. Resolution happens at
/// call time, never cached: the backing device path can be replaced behind
/// our back, and a stale handle would write to the wrong camera. A device
/// that cannot be resolved right now is a silent no-op.
pub struct UvcCam {
    device: String,
    host: Option<Arc<dyn CameraControlHost>>,
}

impl UvcCam {
    pub fn new(config: &UvcConfig, host: Option<Arc<dyn CameraControlHost>>) -> UvcCam {
        UvcCam {
            device: config.device.clone(),
            host,
        }
    }

    fn resolve(&self) -> Option<Arc<dyn CameraControls>> {
        let controls = self.host.as_ref()?.resolve(&self.device);
        if controls.is_none() {
            debug!("{}: device not present, skipping write", self);
        }
        controls
    }

    /// Map a normalized value onto the control's introspected range: scale by
    /// the advertised max, then clamp into [min, max] to absorb rounding.
    fn write_scaled(
        &self,
        controls: &Arc<dyn CameraControls>,
        control: ControlId,
        value: f64,
    ) -> Result<()> {
        let range = controls
            .range(control)
            .ok_or(DriverError::UnsupportedCapability(control_name(control)))?;
        let mapped = ((value * range.max as f64) as i64).clamp(range.min, range.max);
        controls.set(control, mapped)?;
        Ok(())
    }

    fn write_flag(
        &self,
        controls: &Arc<dyn CameraControls>,
        control: ControlId,
        value: bool,
    ) -> Result<()> {
        if controls.range(control).is_none() {
            return Err(DriverError::UnsupportedCapability(control_name(control)));
        }
        controls.set(control, value as i64)?;
        Ok(())
    }
}

fn control_name(control: ControlId) -> &'static str {
    match control {
        ControlId::Pan => "pan",
        ControlId::Tilt => "tilt",
        ControlId::Zoom => "zoom",
        ControlId::Focus => "focus",
        ControlId::FocusAuto => "automatic focus",
        ControlId::WhiteBalAuto => "automatic white balance",
        ControlId::Temperature => "white balance temperature",
    }
}

impl std::fmt::Display for UvcCam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Uvc[{}]", self.device)
    }
}

#[async_trait]
impl DeviceDriver for UvcCam {
    async fn pantilt_abs(&mut self, pan: f64, tilt: f64) -> Result<()> {
        let Some(controls) = self.resolve() else {
            return Ok(());
        };
        self.write_scaled(&controls, ControlId::Pan, pan)?;
        self.write_scaled(&controls, ControlId::Tilt, tilt)
    }

    async fn zoom_abs(&mut self, zoom: f64) -> Result<()> {
        let Some(controls) = self.resolve() else {
            return Ok(());
        };
        self.write_scaled(&controls, ControlId::Zoom, zoom)
    }

    async fn focus_abs(&mut self, focus: f64) -> Result<()> {
        let Some(controls) = self.resolve() else {
            return Ok(());
        };
        self.write_scaled(&controls, ControlId::Focus, focus)
    }

    async fn set_autofocus(&mut self, enabled: bool) -> Result<()> {
        let Some(controls) = self.resolve() else {
            return Ok(());
        };
        self.write_flag(&controls, ControlId::FocusAuto, enabled)
    }

    async fn set_whitebal(&mut self, auto: bool, temperature: i32) -> Result<()> {
        let Some(controls) = self.resolve() else {
            return Ok(());
        };
        self.write_flag(&controls, ControlId::WhiteBalAuto, auto)?;
        if auto {
            return Ok(());
        }
        let range = controls
            .range(ControlId::Temperature)
            .ok_or(DriverError::UnsupportedCapability("white balance temperature"))?;
        // temperature is already in native units, only clamp it
        controls.set(
            ControlId::Temperature,
            (temperature as i64).clamp(range.min, range.max),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeControls {
        ranges: HashMap<ControlId, ControlRange>,
        writes: Mutex<Vec<(ControlId, i64)>>,
    }

    impl FakeControls {
        fn pan_tilt_cam() -> FakeControls {
            let mut ranges = HashMap::new();
            ranges.insert(ControlId::Pan, ControlRange { min: -36000, max: 36000 });
            ranges.insert(ControlId::Tilt, ControlRange { min: -9000, max: 9000 });
            ranges.insert(ControlId::Zoom, ControlRange { min: 100, max: 400 });
            FakeControls {
                ranges,
                writes: Mutex::new(Vec::new()),
            }
        }
    }

    impl CameraControls for FakeControls {
        fn range(&self, control: ControlId) -> Option<ControlRange> {
            self.ranges.get(&control).copied()
        }

        fn set(&self, control: ControlId, value: i64) -> std::io::Result<()> {
            self.writes.lock().unwrap().push((control, value));
            Ok(())
        }
    }

    struct FakeHost {
        cameras: Mutex<HashMap<String, Arc<FakeControls>>>,
    }

    impl FakeHost {
        fn new() -> FakeHost {
            FakeHost {
                cameras: Mutex::new(HashMap::new()),
            }
        }

        fn insert(&self, name: &str, controls: Arc<FakeControls>) {
            self.cameras
                .lock()
                .unwrap()
                .insert(name.to_string(), controls);
        }
    }

    impl CameraControlHost for FakeHost {
        fn resolve(&self, device: &str) -> Option<Arc<dyn CameraControls>> {
            self.cameras
                .lock()
                .unwrap()
                .get(device)
                .map(|c| c.clone() as Arc<dyn CameraControls>)
        }
    }

    fn cam(host: &Arc<FakeHost>) -> UvcCam {
        UvcCam::new(
            &UvcConfig {
                device: "cam0".to_string(),
                presets: vec![],
            },
            Some(host.clone() as Arc<dyn CameraControlHost>),
        )
    }

    #[tokio::test]
    async fn test_mapping_uses_introspected_range() {
        let host = Arc::new(FakeHost::new());
        let controls = Arc::new(FakeControls::pan_tilt_cam());
        host.insert("cam0", controls.clone());

        let mut cam = cam(&host);
        cam.pantilt_abs(0.5, -1.0).await.unwrap();
        let writes = controls.writes.lock().unwrap();
        assert_eq!(writes[0], (ControlId::Pan, 18000));
        assert_eq!(writes[1], (ControlId::Tilt, -9000));
    }

    #[tokio::test]
    async fn test_mapped_value_clamps_into_native_range() {
        let host = Arc::new(FakeHost::new());
        let controls = Arc::new(FakeControls::pan_tilt_cam());
        host.insert("cam0", controls.clone());

        // zoom min is 100, so a small normalized zoom must not go below it
        let mut cam = cam(&host);
        cam.zoom_abs(0.1).await.unwrap();
        assert_eq!(
            *controls.writes.lock().unwrap(),
            vec![(ControlId::Zoom, 100)]
        );
    }

    #[tokio::test]
    async fn test_unresolved_device_is_a_silent_noop() {
        let host = Arc::new(FakeHost::new());
        let mut cam = cam(&host);
        assert!(cam.pantilt_abs(0.5, 0.5).await.is_ok());
    }

    #[tokio::test]
    async fn test_resolution_happens_at_call_time() {
        let host = Arc::new(FakeHost::new());
        let mut cam = cam(&host);
        cam.pantilt_abs(0.5, 0.5).await.unwrap();

        // the camera shows up after the driver was built
        let controls = Arc::new(FakeControls::pan_tilt_cam());
        host.insert("cam0", controls.clone());
        cam.pantilt_abs(0.5, 0.5).await.unwrap();
        assert!(!controls.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_control_reports_unsupported() {
        let host = Arc::new(FakeHost::new());
        host.insert("cam0", Arc::new(FakeControls::pan_tilt_cam()));
        let mut cam = cam(&host);
        match cam.focus_abs(0.5).await {
            Err(DriverError::UnsupportedCapability(_)) => {}
            other => panic!("expected unsupported capability, got {:?}", other),
        }
    }
}
