use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::config::OnvifConfig;
use crate::error::{DriverError, Result};
use crate::position::PtzPosition;

use super::DeviceDriver;

const REQUEST_TIMEOUT_MS: u64 = 2000;

const PTZ_NS: &str = "http://www.onvif.org/ver20/ptz/wsdl";
const MEDIA_NS: &str = "http://www.onvif.org/ver10/media/wsdl";
const IMAGING_NS: &str = "http://www.onvif.org/ver20/imaging/wsdl";
const SCHEMA_NS: &str = "http://www.onvif.org/ver10/schema";

fn security_header(username: &str, password: &str) -> String {
    format!(
        concat!(
            r#"<s:Header><Security s:mustUnderstand="1" "#,
            r#"xmlns="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd">"#,
            r#"<UsernameToken><Username>{}</Username>"#,
            r#"<Password Type="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordText">{}</Password>"#,
            r#"</UsernameToken></Security></s:Header>"#
        ),
        username, password
    )
}

fn envelope(header: &str, body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">"#,
            "{}<s:Body>{}</s:Body></s:Envelope>"
        ),
        header, body
    )
}

/// Pull the `token` attribute off the first element with the given local
/// name, ignoring namespace prefixes.
fn first_token(xml: &str, local_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) | Event::Empty(e) => {
                if e.local_name().as_ref() == local_name.as_bytes() {
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"token" {
                            return String::from_utf8(attr.value.into_owned()).ok();
                        }
                    }
                }
            }
            Event::Eof => return None,
            _ => {}
        }
    }
}

fn is_fault(xml: &str) -> bool {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"Fault" => return true,
            Ok(Event::Eof) | Err(_) => return false,
            _ => {}
        }
    }
}

/// ONVIF driver speaking SOAP to a single service endpoint. Positions use
/// the generic ONVIF space, which is normalized the same way ours is, so
/// values go onto the wire untouched. The media profile and video source
/// tokens are fetched on first use and kept until disconnect.
pub struct OnvifCam {
    url: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
    profile_token: Option<String>,
    video_source_token: Option<String>,
}

impl OnvifCam {
    pub fn new(config: &OnvifConfig) -> OnvifCam {
        OnvifCam {
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client: reqwest::Client::new(),
            profile_token: None,
            video_source_token: None,
        }
    }

    async fn post(&self, body: &str) -> Result<String> {
        let header = match (&self.username, &self.password) {
            (Some(user), Some(pass)) => security_header(user, pass),
            _ => String::new(),
        };
        let request = envelope(&header, body);
        debug!("{}: posting {}", self, body);
        let response = self
            .client
            .post(&self.url)
            .timeout(Duration::from_millis(REQUEST_TIMEOUT_MS))
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .body(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    DriverError::EndpointUnavailable(e.to_string())
                } else {
                    DriverError::Transport(e.to_string())
                }
            })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DriverError::Transport(e.to_string()))?;
        if !status.is_success() || is_fault(&text) {
            return Err(DriverError::Transport(format!(
                "{}: request rejected ({})",
                self.url, status
            )));
        }
        Ok(text)
    }

    async fn profile_token(&mut self) -> Result<String> {
        if let Some(token) = &self.profile_token {
            return Ok(token.clone());
        }
        let response = self
            .post(&format!(r#"<GetProfiles xmlns="{}"/>"#, MEDIA_NS))
            .await?;
        let token = first_token(&response, "Profiles").ok_or_else(|| {
            DriverError::Transport(format!("{}: no media profiles", self.url))
        })?;
        self.profile_token = Some(token.clone());
        Ok(token)
    }

    async fn video_source_token(&mut self) -> Result<String> {
        if let Some(token) = &self.video_source_token {
            return Ok(token.clone());
        }
        let response = self
            .post(&format!(r#"<GetVideoSources xmlns="{}"/>"#, MEDIA_NS))
            .await?;
        let token = first_token(&response, "VideoSources").ok_or_else(|| {
            DriverError::Transport(format!("{}: no video sources", self.url))
        })?;
        self.video_source_token = Some(token.clone());
        Ok(token)
    }

    async fn move_request(&mut self, operation: &str, pan: f64, tilt: f64) -> Result<()> {
        let token = self.profile_token().await?;
        let body = format!(
            concat!(
                r#"<{op} xmlns="{ns}"><ProfileToken>{token}</ProfileToken>"#,
                r#"<Position><PanTilt x="{pan}" y="{tilt}" xmlns="{schema}"/></Position>"#,
                r#"</{op}>"#
            ),
            op = operation,
            ns = PTZ_NS,
            schema = SCHEMA_NS,
            token = token,
            pan = pan,
            tilt = tilt,
        );
        self.post(&body).await?;
        Ok(())
    }
}

impl std::fmt::Display for OnvifCam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Onvif[{}]", self.url)
    }
}

#[async_trait]
impl DeviceDriver for OnvifCam {
    async fn pantilt_abs(&mut self, pan: f64, tilt: f64) -> Result<()> {
        self.move_request("AbsoluteMove", pan, tilt).await
    }

    // native relative move; the caller's position is not needed
    async fn pantilt_rel(&mut self, _from: PtzPosition, dp: f64, dt: f64) -> Result<()> {
        self.move_request("RelativeMove", dp, dt).await
    }

    async fn pantilt_home(&mut self) -> Result<()> {
        let token = self.profile_token().await?;
        let body = format!(
            r#"<GotoHomePosition xmlns="{}"><ProfileToken>{}</ProfileToken></GotoHomePosition>"#,
            PTZ_NS, token
        );
        self.post(&body).await?;
        Ok(())
    }

    async fn zoom_abs(&mut self, zoom: f64) -> Result<()> {
        let token = self.profile_token().await?;
        let body = format!(
            concat!(
                r#"<AbsoluteMove xmlns="{ns}"><ProfileToken>{token}</ProfileToken>"#,
                r#"<Position><Zoom x="{zoom}" xmlns="{schema}"/></Position>"#,
                r#"</AbsoluteMove>"#
            ),
            ns = PTZ_NS,
            schema = SCHEMA_NS,
            token = token,
            zoom = zoom,
        );
        self.post(&body).await?;
        Ok(())
    }

    async fn focus_abs(&mut self, focus: f64) -> Result<()> {
        let token = self.video_source_token().await?;
        let body = format!(
            concat!(
                r#"<Move xmlns="{ns}"><VideoSourceToken>{token}</VideoSourceToken>"#,
                r#"<Focus><Absolute><Position xmlns="{schema}">{focus}</Position></Absolute></Focus>"#,
                r#"</Move>"#
            ),
            ns = IMAGING_NS,
            schema = SCHEMA_NS,
            token = token,
            focus = focus,
        );
        self.post(&body).await?;
        Ok(())
    }

    async fn set_autofocus(&mut self, enabled: bool) -> Result<()> {
        let token = self.video_source_token().await?;
        let mode = if enabled { "AUTO" } else { "MANUAL" };
        let body = format!(
            concat!(
                r#"<SetImagingSettings xmlns="{ns}"><VideoSourceToken>{token}</VideoSourceToken>"#,
                r#"<ImagingSettings><Focus xmlns="{schema}"><AutoFocusMode>{mode}</AutoFocusMode></Focus></ImagingSettings>"#,
                r#"</SetImagingSettings>"#
            ),
            ns = IMAGING_NS,
            schema = SCHEMA_NS,
            token = token,
            mode = mode,
        );
        self.post(&body).await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.profile_token = None;
        self.video_source_token = None;
        Ok(())
    }
}

#[test]
fn test_envelope_carries_credentials_only_when_present() {
    let with = envelope(&security_header("admin", "pw"), "<x/>");
    assert!(with.contains("<Username>admin</Username>"));
    assert!(with.contains("PasswordText"));

    let without = envelope("", "<x/>");
    assert!(!without.contains("UsernameToken"));
    assert!(without.contains("<s:Body><x/></s:Body>"));
}

#[test]
fn test_first_token_ignores_namespace_prefix() {
    let xml = concat!(
        r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body>"#,
        r#"<trt:GetProfilesResponse xmlns:trt="http://www.onvif.org/ver10/media/wsdl">"#,
        r#"<trt:Profiles token="Profile_1" fixed="true"><tt:Name xmlns:tt="x">main</tt:Name></trt:Profiles>"#,
        r#"<trt:Profiles token="Profile_2"/>"#,
        r#"</trt:GetProfilesResponse></s:Body></s:Envelope>"#
    );
    assert_eq!(first_token(xml, "Profiles").as_deref(), Some("Profile_1"));
    assert_eq!(first_token(xml, "VideoSources"), None);
}

#[test]
fn test_fault_detection() {
    let fault = concat!(
        r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body>"#,
        r#"<s:Fault><s:Code/></s:Fault></s:Body></s:Envelope>"#
    );
    assert!(is_fault(fault));
    assert!(!is_fault("<s:Envelope><s:Body/></s:Envelope>"));
}
