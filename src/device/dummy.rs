use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DriverError, Result};

use super::DeviceDriver;

/// Every write the dummy driver accepted, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOp {
    PanTiltAbs(f64, f64),
    PanTiltHome,
    ZoomAbs(f64),
    FocusAbs(f64),
    AutoFocus(bool),
    WhiteBal(bool, i32),
    Disconnect,
}

/// Driver with no hardware behind it. Records everything it is asked to do,
/// which makes it both a placeholder device in a config and the call-order
/// capture double for façade tests. The failing flavor reports a transport
/// error on every write instead.
pub struct Dummy {
    ops: Arc<Mutex<Vec<RecordedOp>>>,
    fail: bool,
}

impl Dummy {
    pub fn new() -> Dummy {
        Dummy {
            ops: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    pub fn failing() -> Dummy {
        Dummy {
            fail: true,
            ..Dummy::new()
        }
    }

    pub fn ops_log(&self) -> Arc<Mutex<Vec<RecordedOp>>> {
        self.ops.clone()
    }

    fn record(&self, op: RecordedOp) -> Result<()> {
        debug!("{}: {:?}", self, op);
        self.ops.lock().unwrap().push(op);
        if self.fail {
            return Err(DriverError::Transport("dummy write failed".to_string()));
        }
        Ok(())
    }
}

impl Default for Dummy {
    fn default() -> Self {
        Dummy::new()
    }
}

impl std::fmt::Display for Dummy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dummy")
    }
}

#[async_trait]
impl DeviceDriver for Dummy {
    async fn pantilt_abs(&mut self, pan: f64, tilt: f64) -> Result<()> {
        self.record(RecordedOp::PanTiltAbs(pan, tilt))
    }

    async fn pantilt_home(&mut self) -> Result<()> {
        self.record(RecordedOp::PanTiltHome)
    }

    async fn zoom_abs(&mut self, zoom: f64) -> Result<()> {
        self.record(RecordedOp::ZoomAbs(zoom))
    }

    async fn focus_abs(&mut self, focus: f64) -> Result<()> {
        self.record(RecordedOp::FocusAbs(focus))
    }

    async fn set_autofocus(&mut self, enabled: bool) -> Result<()> {
        self.record(RecordedOp::AutoFocus(enabled))
    }

    async fn set_whitebal(&mut self, auto: bool, temperature: i32) -> Result<()> {
        self.record(RecordedOp::WhiteBal(auto, temperature))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.record(RecordedOp::Disconnect)
    }
}
