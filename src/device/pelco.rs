use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt as _, sync::Mutex};
use tokio_serial::SerialPortBuilderExt as _;
use tracing::debug;

use crate::config::PelcoConfig;
use crate::error::{DriverError, Result};

use super::DeviceDriver;

// Extended opcodes shared by the D and P dialects.
const OP_SET_PAN: u8 = 0x4B;
const OP_SET_TILT: u8 = 0x4D;
const OP_SET_ZOOM: u8 = 0x5F;
const OP_AUTO_FOCUS: u8 = 0x2B;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Variant {
    D,
    P,
}

/// Pelco D: 0xFF STX, address, two command bytes, two data bytes, modulo-256
/// sum of everything after the STX.
fn frame_d(camera: u8, cmd1: u8, cmd2: u8, data1: u8, data2: u8) -> Vec<u8> {
    let sum = camera
        .wrapping_add(cmd1)
        .wrapping_add(cmd2)
        .wrapping_add(data1)
        .wrapping_add(data2);
    vec![0xFF, camera, cmd1, cmd2, data1, data2, sum]
}

/// Pelco P: 0xA0 STX, zero-based address, two command bytes, two data bytes,
/// 0xAF ETX, XOR of all preceding bytes.
fn frame_p(camera: u8, cmd1: u8, cmd2: u8, data1: u8, data2: u8) -> Vec<u8> {
    let mut frame = vec![0xA0, camera.wrapping_sub(1), cmd1, cmd2, data1, data2, 0xAF];
    let checksum = frame.iter().fold(0u8, |acc, &b| acc ^ b);
    frame.push(checksum);
    frame
}

fn build_frame(variant: Variant, camera: u8, opcode: u8, value: u16) -> Vec<u8> {
    let [hi, lo] = value.to_be_bytes();
    match variant {
        Variant::D => frame_d(camera, 0x00, opcode, hi, lo),
        Variant::P => frame_p(camera, 0x00, opcode, hi, lo),
    }
}

/// Pan position in hundredths of a degree, 0 at the left stop: [-1, 1] maps
/// onto [0, 35999] with 0.0 at center.
fn pan_hundredths(pan: f64) -> u16 {
    ((((pan.clamp(-1.0, 1.0) + 1.0) / 2.0 * 35999.0) as i32).clamp(0, 35999)) as u16
}

/// Tilt angle in hundredths of a degree over ±90°; negative angles wrap
/// modulo 36000 as the receivers expect.
fn tilt_hundredths(tilt: f64) -> u16 {
    let angle = (tilt.clamp(-1.0, 1.0) * 9000.0) as i32;
    ((36000 + angle) % 36000) as u16
}

fn zoom_counts(zoom: f64) -> u16 {
    ((zoom.clamp(0.0, 1.0) * 65535.0) as i32).clamp(0, 65535) as u16
}

struct SerialLine {
    port: String,
    baud: u32,
    stream: Option<tokio_serial::SerialStream>,
}

impl SerialLine {
    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        if self.stream.is_none() {
            let stream = tokio_serial::new(&self.port, self.baud)
                .data_bits(tokio_serial::DataBits::Eight)
                .parity(tokio_serial::Parity::None)
                .stop_bits(tokio_serial::StopBits::One)
                .open_native_async()
                .map_err(|e| DriverError::EndpointUnavailable(e.to_string()))?;
            self.stream = Some(stream);
        }
        if let Err(e) = self.stream.as_mut().unwrap().write_all(frame).await {
            // reopen on the next command
            self.stream = None;
            return Err(DriverError::Transport(e.to_string()));
        }
        Ok(())
    }
}

/// One lazily-opened handle per serial port, shared by every Pelco device
/// addressed over that line. The per-line mutex keeps frames from different
/// cameras from interleaving on the wire.
pub struct SerialPool {
    lines: StdMutex<HashMap<String, Arc<Mutex<SerialLine>>>>,
}

impl SerialPool {
    pub fn new() -> SerialPool {
        SerialPool {
            lines: StdMutex::new(HashMap::new()),
        }
    }

    fn line(&self, port: &str, baud: u32) -> Arc<Mutex<SerialLine>> {
        self.lines
            .lock()
            .unwrap()
            .entry(port.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SerialLine {
                    port: port.to_string(),
                    baud,
                    stream: None,
                }))
            })
            .clone()
    }
}

impl Default for SerialPool {
    fn default() -> Self {
        SerialPool::new()
    }
}

pub struct PelcoCam {
    variant: Variant,
    camera: u8,
    port: String,
    line: Arc<Mutex<SerialLine>>,
}

impl PelcoCam {
    pub fn new(variant: Variant, config: &PelcoConfig, pool: &SerialPool) -> PelcoCam {
        PelcoCam {
            variant,
            camera: config.camera,
            port: config.port.clone(),
            line: pool.line(&config.port, config.baud),
        }
    }

    async fn send(&self, frame: Vec<u8>) -> Result<()> {
        debug!("{}: sending {}", self, hex::encode(&frame));
        self.line.lock().await.write(&frame).await
    }
}

impl std::fmt::Display for PelcoCam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dialect = match self.variant {
            Variant::D => "pelco-d",
            Variant::P => "pelco-p",
        };
        write!(f, "Pelco[{}://{}#{}]", dialect, self.port, self.camera)
    }
}

#[async_trait]
impl DeviceDriver for PelcoCam {
    async fn pantilt_abs(&mut self, pan: f64, tilt: f64) -> Result<()> {
        self.send(build_frame(
            self.variant,
            self.camera,
            OP_SET_PAN,
            pan_hundredths(pan),
        ))
        .await?;
        self.send(build_frame(
            self.variant,
            self.camera,
            OP_SET_TILT,
            tilt_hundredths(tilt),
        ))
        .await
    }

    async fn zoom_abs(&mut self, zoom: f64) -> Result<()> {
        self.send(build_frame(
            self.variant,
            self.camera,
            OP_SET_ZOOM,
            zoom_counts(zoom),
        ))
        .await
    }

    async fn focus_abs(&mut self, _focus: f64) -> Result<()> {
        Err(DriverError::UnsupportedCapability("absolute focus"))
    }

    async fn set_autofocus(&mut self, enabled: bool) -> Result<()> {
        if self.variant == Variant::P {
            return Err(DriverError::UnsupportedCapability("automatic focus"));
        }
        let mode = if enabled { 0x00 } else { 0x01 };
        self.send(build_frame(self.variant, self.camera, OP_AUTO_FOCUS, mode))
            .await
    }
}

#[test]
fn test_pelco_d_checksum_is_modulo_sum() {
    let frame = frame_d(0x01, 0x00, 0x4B, 0x46, 0x50);
    assert_eq!(hex::encode(frame), "ff01004b4650e2");
}

#[test]
fn test_pelco_p_checksum_is_xor() {
    let frame = frame_p(0x01, 0x00, 0x4B, 0x46, 0x50);
    assert_eq!(hex::encode(frame), "a000004b4650af52");
}

#[test]
fn test_position_mappings() {
    assert_eq!(pan_hundredths(0.0), 17999);
    assert_eq!(pan_hundredths(1.0), 35999);
    assert_eq!(pan_hundredths(-1.0), 0);
    // out-of-range input saturates
    assert_eq!(pan_hundredths(9.0), 35999);

    assert_eq!(tilt_hundredths(1.0), 9000);
    assert_eq!(tilt_hundredths(0.0), 0);
    assert_eq!(tilt_hundredths(-1.0), 27000);

    assert_eq!(zoom_counts(0.0), 0);
    assert_eq!(zoom_counts(1.0), 65535);
}

#[test]
fn test_build_frame_splits_value_big_endian() {
    let frame = build_frame(Variant::D, 1, OP_SET_PAN, 0x1234);
    assert_eq!(frame[4], 0x12);
    assert_eq!(frame[5], 0x34);
}
