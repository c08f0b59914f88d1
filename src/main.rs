use std::error::Error;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ptzcam::config;
use ptzcam::device::{DeviceRegistry, PtzDevice};

const TICK_INTERVAL_MS: u64 = 16;

#[derive(Deserialize, Debug)]
struct ControlRequest {
    device: String,
    #[serde(flatten)]
    action: Action,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "action")]
#[serde(rename_all = "camelCase")]
enum Action {
    PanTiltAbs { pan: f64, tilt: f64 },
    PanTiltRel { pan: f64, tilt: f64 },
    PanTiltSpeed { pan: f64, tilt: f64 },
    PanTiltHome,
    ZoomAbs { zoom: f64 },
    ZoomSpeed { speed: f64 },
    FocusAbs { focus: f64 },
    FocusSpeed { speed: f64 },
    AutoFocus { enabled: bool },
    WhiteBal {
        auto: bool,
        #[serde(default)]
        temperature: i32,
    },
    PresetSet { id: i32 },
    PresetRecall { id: i32 },
    PresetReset { id: i32 },
}

fn dispatch(device: &mut PtzDevice, action: Action) {
    match action {
        Action::PanTiltAbs { pan, tilt } => device.pantilt_abs(pan, tilt),
        Action::PanTiltRel { pan, tilt } => device.pantilt_rel(pan, tilt),
        Action::PanTiltSpeed { pan, tilt } => device.pantilt_speed(pan, tilt),
        Action::PanTiltHome => device.pantilt_home(),
        Action::ZoomAbs { zoom } => device.zoom_abs(zoom),
        Action::ZoomSpeed { speed } => device.zoom_speed(speed),
        Action::FocusAbs { focus } => device.focus_abs(focus),
        Action::FocusSpeed { speed } => device.focus_speed(speed),
        Action::AutoFocus { enabled } => device.set_autofocus(enabled),
        Action::WhiteBal { auto, temperature } => device.set_whitebal(auto, temperature),
        Action::PresetSet { id } => device.memory_set(id),
        Action::PresetRecall { id } => device.memory_recall(id),
        Action::PresetReset { id } => device.memory_reset(id),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let mut config = match config::load_config().await {
        Ok(config) => config,
        Err(e) => {
            warn!("no usable config, starting empty: {e}");
            config::Config::default()
        }
    };

    let mut registry = DeviceRegistry::new();
    registry.load(&config);
    info!("controlling {} device(s)", config.devices.len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                registry.tick_all((now - last_tick).as_secs_f32());
                last_tick = now;
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        let request: ControlRequest = match serde_json::from_str(&line) {
                            Ok(request) => request,
                            Err(e) => {
                                warn!("invalid control request: {e}");
                                continue;
                            }
                        };
                        match registry.get_mut(&request.device) {
                            Some(device) => dispatch(device, request.action),
                            None => warn!("unknown device: {}", request.device),
                        }
                    }
                    None => break,
                }
            }
            _ = &mut shutdown => break,
        }
    }

    info!("shutting down");
    registry.save_into(&mut config);
    if let Err(e) = config::save_config(&config).await {
        warn!("failed to save config: {e}");
    }
    registry.shutdown_all().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
