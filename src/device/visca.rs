use std::time::Duration;

use async_trait::async_trait;
use bincode::Options as _;
use futures::TryFutureExt as _;
use serde::Serialize;
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpStream, UdpSocket},
    time::timeout,
};
use tracing::debug;

use crate::config::ViscaConfig;
use crate::error::{DriverError, Result};
use crate::position::PtzPosition;

use super::DeviceDriver;

// Native ranges of the classic EVI-style position space.
const PAN_MAX: i32 = 0x08DB;
const TILT_MAX: i32 = 0x0190;
const ZOOM_MAX: i32 = 0x4000;
const FOCUS_MAX: i32 = 0x1000;

const PAN_SPEED: u8 = 0x18;
const TILT_SPEED: u8 = 0x14;
const CONNECT_TIMEOUT_MS: u64 = 500;
const READ_TIMEOUT_MS: u64 = 200;

/// Map a normalized [-1, 1] value onto [-max, max], clamping the mapped
/// value once more against rounding past the bounds.
fn scale_signed(value: f64, max: i32) -> i32 {
    ((value.clamp(-1.0, 1.0) * max as f64) as i32).clamp(-max, max)
}

/// Map a normalized [0, 1] value onto [0, max].
fn scale_unsigned(value: f64, max: i32) -> i32 {
    ((value.clamp(0.0, 1.0) * max as f64) as i32).clamp(0, max)
}

/// VISCA positions travel as 16-bit two's complement split into four
/// low-nibble bytes, high nibble first.
fn nibbles(value: i32) -> [u8; 4] {
    let v = value as i16 as u16;
    [
        ((v >> 12) & 0x0F) as u8,
        ((v >> 8) & 0x0F) as u8,
        ((v >> 4) & 0x0F) as u8,
        (v & 0x0F) as u8,
    ]
}

fn header(camera: u8) -> u8 {
    0x80 | (camera & 0x07)
}

fn pantilt_frame(camera: u8, opcode: u8, pan: i32, tilt: i32) -> Vec<u8> {
    let mut frame = vec![header(camera), 0x01, 0x06, opcode, PAN_SPEED, TILT_SPEED];
    frame.extend(nibbles(pan));
    frame.extend(nibbles(tilt));
    frame.push(0xFF);
    frame
}

fn pantilt_home_frame(camera: u8) -> Vec<u8> {
    vec![header(camera), 0x01, 0x06, 0x04, 0xFF]
}

fn lens_frame(camera: u8, opcode: u8, position: i32) -> Vec<u8> {
    let mut frame = vec![header(camera), 0x01, 0x04, opcode];
    frame.extend(nibbles(position));
    frame.push(0xFF);
    frame
}

fn autofocus_frame(camera: u8, enabled: bool) -> Vec<u8> {
    let mode = if enabled { 0x02 } else { 0x03 };
    vec![header(camera), 0x01, 0x04, 0x38, mode, 0xFF]
}

/// VISCA-over-IP envelope: payload type, payload length, sequence number,
/// all big-endian, followed by the raw frame.
#[derive(Debug, Serialize)]
struct IpHeader {
    payload_type: u16,
    length: u16,
    seq: u32,
}

fn wrap_ip(seq: u32, payload: &[u8]) -> Vec<u8> {
    let header = IpHeader {
        payload_type: 0x0100,
        length: payload.len() as u16,
        seq,
    };
    let mut datagram = bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .serialize(&header)
        .unwrap();
    datagram.extend_from_slice(payload);
    datagram
}

enum Transport {
    Tcp(Option<TcpStream>),
    Udp { socket: Option<UdpSocket>, seq: u32 },
}

/// VISCA driver over TCP (persistent stream, raw frames) or UDP
/// (VISCA-over-IP envelopes). Commands are fire-and-forget: a failed write
/// drops the connection and the next command connects fresh, and any late
/// ack is read with a short timeout and discarded.
pub struct ViscaCam {
    host: String,
    port: u16,
    camera: u8,
    transport: Transport,
}

impl ViscaCam {
    pub fn tcp(config: &ViscaConfig) -> ViscaCam {
        ViscaCam {
            host: config.host.clone(),
            port: config.port,
            camera: config.camera,
            transport: Transport::Tcp(None),
        }
    }

    pub fn udp(config: &ViscaConfig) -> ViscaCam {
        ViscaCam {
            host: config.host.clone(),
            port: config.port,
            camera: config.camera,
            transport: Transport::Udp {
                socket: None,
                seq: 0,
            },
        }
    }

    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        debug!("{}: sending {}", self, hex::encode(frame));
        let host = self.host.clone();
        let port = self.port;
        match &mut self.transport {
            Transport::Tcp(slot) => {
                if slot.is_none() {
                    let stream = timeout(
                        Duration::from_millis(CONNECT_TIMEOUT_MS),
                        create_socket(&host, port),
                    )
                    .map_err(|_| {
                        DriverError::EndpointUnavailable(format!(
                            "{}:{}: connect timed out",
                            host, port
                        ))
                    })
                    .await?
                    .map_err(|e| DriverError::EndpointUnavailable(e.to_string()))?;
                    *slot = Some(stream);
                }
                let stream = slot.as_mut().unwrap();
                if let Err(e) = stream.write_all(frame).await {
                    *slot = None;
                    return Err(DriverError::Transport(e.to_string()));
                }
                // drain the ack if it arrives quickly; a silent camera is fine
                let mut ack = [0u8; 16];
                let _ = timeout(
                    Duration::from_millis(READ_TIMEOUT_MS),
                    stream.read(&mut ack),
                )
                .await;
                Ok(())
            }
            Transport::Udp { socket, seq } => {
                if socket.is_none() {
                    let s = UdpSocket::bind("0.0.0.0:0")
                        .await
                        .map_err(|e| DriverError::EndpointUnavailable(e.to_string()))?;
                    s.connect((host.as_str(), port))
                        .await
                        .map_err(|e| DriverError::EndpointUnavailable(e.to_string()))?;
                    *socket = Some(s);
                }
                let datagram = wrap_ip(*seq, frame);
                *seq = seq.wrapping_add(1);
                if let Err(e) = socket.as_ref().unwrap().send(&datagram).await {
                    *socket = None;
                    return Err(DriverError::Transport(e.to_string()));
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for ViscaCam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transport = match self.transport {
            Transport::Tcp(_) => "tcp",
            Transport::Udp { .. } => "udp",
        };
        write!(f, "Visca[{}://{}:{}#{}]", transport, self.host, self.port, self.camera)
    }
}

#[async_trait]
impl DeviceDriver for ViscaCam {
    async fn pantilt_abs(&mut self, pan: f64, tilt: f64) -> Result<()> {
        let frame = pantilt_frame(
            self.camera,
            0x02,
            scale_signed(pan, PAN_MAX),
            scale_signed(tilt, TILT_MAX),
        );
        self.send(&frame).await
    }

    // native relative move; the caller's position is not needed
    async fn pantilt_rel(&mut self, _from: PtzPosition, dp: f64, dt: f64) -> Result<()> {
        let frame = pantilt_frame(
            self.camera,
            0x03,
            scale_signed(dp, PAN_MAX),
            scale_signed(dt, TILT_MAX),
        );
        self.send(&frame).await
    }

    async fn pantilt_home(&mut self) -> Result<()> {
        let frame = pantilt_home_frame(self.camera);
        self.send(&frame).await
    }

    async fn zoom_abs(&mut self, zoom: f64) -> Result<()> {
        let frame = lens_frame(self.camera, 0x47, scale_unsigned(zoom, ZOOM_MAX));
        self.send(&frame).await
    }

    async fn focus_abs(&mut self, focus: f64) -> Result<()> {
        let frame = lens_frame(self.camera, 0x48, scale_unsigned(focus, FOCUS_MAX));
        self.send(&frame).await
    }

    async fn set_autofocus(&mut self, enabled: bool) -> Result<()> {
        let frame = autofocus_frame(self.camera, enabled);
        self.send(&frame).await
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Transport::Tcp(slot) = &mut self.transport {
            if let Some(mut stream) = slot.take() {
                stream.shutdown().await?;
            }
        }
        Ok(())
    }
}

async fn create_socket(address: &str, port: u16) -> std::io::Result<TcpStream> {
    let stream = TcpStream::connect((address, port)).await?;

    let sock_ref = socket2::SockRef::from(&stream);

    let mut ka = socket2::TcpKeepalive::new();
    ka = ka.with_time(Duration::from_secs(20));
    ka = ka.with_interval(Duration::from_secs(20));

    sock_ref.set_tcp_keepalive(&ka)?;
    Ok(stream)
}

#[test]
fn test_nibbles_split_two_s_complement() {
    assert_eq!(nibbles(0x1234), [0x01, 0x02, 0x03, 0x04]);
    assert_eq!(nibbles(0), [0, 0, 0, 0]);
    // -2 == 0xFFFE
    assert_eq!(nibbles(-2), [0x0F, 0x0F, 0x0F, 0x0E]);
}

#[test]
fn test_scaling_clamps_twice() {
    assert_eq!(scale_signed(5.0, PAN_MAX), PAN_MAX);
    assert_eq!(scale_signed(-5.0, PAN_MAX), -PAN_MAX);
    assert_eq!(scale_unsigned(1.5, ZOOM_MAX), ZOOM_MAX);
    assert_eq!(scale_unsigned(-0.5, ZOOM_MAX), 0);
}

#[test]
fn test_pantilt_absolute_frame() {
    let frame = pantilt_frame(1, 0x02, 0, 0);
    assert_eq!(hex::encode(frame), "8101060218140000000000000000ff");
    let frame = pantilt_frame(1, 0x02, 0x08DB, -0x0190);
    assert_eq!(hex::encode(frame), "81010602181400080d0b0f0e0700ff");
}

#[test]
fn test_lens_and_autofocus_frames() {
    assert_eq!(
        hex::encode(lens_frame(1, 0x47, 0x4000)),
        "8101044704000000ff"
    );
    assert_eq!(hex::encode(autofocus_frame(1, true)), "8101043802ff");
    assert_eq!(hex::encode(autofocus_frame(2, false)), "8201043803ff");
    assert_eq!(hex::encode(pantilt_home_frame(1)), "81010604ff");
}

#[test]
fn test_visca_over_ip_envelope() {
    let datagram = wrap_ip(7, &[0x81, 0x01, 0xFF]);
    assert_eq!(hex::encode(datagram), "01000003000000078101ff");
}
