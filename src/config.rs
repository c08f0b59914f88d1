use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{env, error::Error};

use crate::preset::PresetRecord;

#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub devices: IndexMap<String, DeviceConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum DeviceConfig {
    Dummy(DummyConfig),
    Uvc(UvcConfig),
    ViscaTcp(ViscaConfig),
    ViscaUdp(ViscaConfig),
    PelcoD(PelcoConfig),
    PelcoP(PelcoConfig),
    Onvif(OnvifConfig),
}

impl DeviceConfig {
    pub fn presets(&self) -> &Vec<PresetRecord> {
        match self {
            DeviceConfig::Dummy(c) => &c.presets,
            DeviceConfig::Uvc(c) => &c.presets,
            DeviceConfig::ViscaTcp(c) | DeviceConfig::ViscaUdp(c) => &c.presets,
            DeviceConfig::PelcoD(c) | DeviceConfig::PelcoP(c) => &c.presets,
            DeviceConfig::Onvif(c) => &c.presets,
        }
    }

    pub fn presets_mut(&mut self) -> &mut Vec<PresetRecord> {
        match self {
            DeviceConfig::Dummy(c) => &mut c.presets,
            DeviceConfig::Uvc(c) => &mut c.presets,
            DeviceConfig::ViscaTcp(c) | DeviceConfig::ViscaUdp(c) => &mut c.presets,
            DeviceConfig::PelcoD(c) | DeviceConfig::PelcoP(c) => &mut c.presets,
            DeviceConfig::Onvif(c) => &mut c.presets,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DummyConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<PresetRecord>,
}

/// Local UVC camera, addressed by the device name the control host knows it
/// under (a v4l2 path, a DirectShow device path, an OBS source name).
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UvcConfig {
    pub device: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<PresetRecord>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ViscaConfig {
    pub host: String,
    #[serde(default = "default_visca_port")]
    pub port: u16,
    /// Camera number on the VISCA chain, 1-7.
    #[serde(default = "default_camera")]
    pub camera: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<PresetRecord>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PelcoConfig {
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Receiver address encoded into every frame, 1-255.
    #[serde(default = "default_camera")]
    pub camera: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<PresetRecord>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OnvifConfig {
    /// Service endpoint, e.g. "http://10.0.0.5:8000/onvif/device_service".
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<PresetRecord>,
}

fn default_visca_port() -> u16 {
    52381
}

fn default_camera() -> u8 {
    1
}

fn default_baud() -> u32 {
    9600
}

fn config_path() -> String {
    let args: Vec<String> = env::args().collect();
    match args.get(1) {
        Some(path) => path.clone(),
        None => "config.json".to_string(),
    }
}

pub async fn load_config() -> Result<Config, Box<dyn Error>> {
    let content = tokio::fs::read_to_string(config_path()).await?;
    let config: Config = serde_json::from_str(&content)?;
    check_duplicate_preset_ids(&config)?;
    Ok(config)
}

pub async fn save_config(config: &Config) -> Result<(), Box<dyn Error>> {
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(config_path(), content).await?;
    Ok(())
}

fn check_duplicate_preset_ids(config: &Config) -> Result<(), Box<dyn Error>> {
    for (name, device) in &config.devices {
        let dupes: Vec<i32> = device
            .presets()
            .iter()
            .map(|p| p.preset_id)
            .duplicates()
            .collect();
        if !dupes.is_empty() {
            return Err(format!(
                "device {}: duplicate preset ids: {}",
                name,
                dupes.iter().join(", ")
            )
            .into());
        }
    }
    Ok(())
}

#[test]
fn test_check_duplicate_preset_ids() {
    use crate::position::PtzPosition;

    let preset = |id| PresetRecord {
        preset_id: id,
        position: PtzPosition::default(),
    };
    let mut config = Config::default();
    config.devices.insert(
        "cam1".to_string(),
        DeviceConfig::Dummy(DummyConfig {
            presets: vec![preset(1), preset(2), preset(1)],
        }),
    );
    assert!(check_duplicate_preset_ids(&config).is_err());

    config.devices.insert(
        "cam1".to_string(),
        DeviceConfig::Dummy(DummyConfig {
            presets: vec![preset(1), preset(2)],
        }),
    );
    assert!(check_duplicate_preset_ids(&config).is_ok());
}

#[test]
fn test_device_config_round_trip() {
    let json = r#"{
        "devices": {
            "hall": {
                "type": "viscaUdp",
                "host": "10.1.2.3",
                "camera": 2,
                "presets": [
                    {"presetId": 1, "pan": 0.5, "tilt": -0.25, "zoom": 0.1,
                     "focusAuto": false, "focus": 0.8}
                ]
            },
            "door": {"type": "pelcoD", "port": "/dev/ttyUSB0"}
        }
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();
    match &config.devices["hall"] {
        DeviceConfig::ViscaUdp(c) => {
            assert_eq!(c.port, 52381);
            assert_eq!(c.camera, 2);
            assert_eq!(c.presets.len(), 1);
            assert!(!c.presets[0].position.focus_auto);
        }
        other => panic!("wrong variant: {:?}", other),
    }
    match &config.devices["door"] {
        DeviceConfig::PelcoD(c) => assert_eq!(c.baud, 9600),
        other => panic!("wrong variant: {:?}", other),
    }

    let out = serde_json::to_string(&config).unwrap();
    let back: Config = serde_json::from_str(&out).unwrap();
    assert_eq!(back.devices.len(), 2);
    // empty preset lists stay out of the file
    let door = serde_json::to_string(&config.devices["door"]).unwrap();
    assert!(!door.contains("presets"));
}
