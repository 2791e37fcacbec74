//! Renderer UPnP/DLNA découvert par SSDP.
//!
//! Pas de session persistante : chaque lecture de description et chaque
//! action SOAP ouvre sa propre connexion HTTP.

use std::time::Duration;

use pmoupnp::{DeviceDescription, SsdpResult, UpnpService, parse_device_description};
use tracing::{debug, info, warn};
use ureq::Agent;
use url::Url;

use crate::capabilities::{DeviceConnection, MediaControl, Named, VolumeControl};
use crate::errors::ControlPointError;
use crate::soap_client::{SoapCallResult, handle_action_response, invoke_upnp_action};

pub const AV_TRANSPORT: &str = "AVTransport";
pub const RENDERING_CONTROL: &str = "RenderingControl";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Action SOAP à invoquer et ses arguments, dans l'ordre d'émission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceParameter {
    pub action: String,
    pub args: Vec<(String, String)>,
}

impl ServiceParameter {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            args: Vec::new(),
        }
    }

    /// Action portant `InstanceID = 0`, comme toutes celles d'AVTransport
    /// et de RenderingControl.
    pub fn instance(action: impl Into<String>) -> Self {
        Self::new(action).arg("InstanceID", "0")
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct UpnpDevice {
    ssdp: SsdpResult,
    description: Option<DeviceDescription>,
    http_timeout: Duration,
}

impl UpnpDevice {
    pub fn from_ssdp(ssdp: SsdpResult) -> Self {
        Self {
            ssdp,
            description: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn ssdp(&self) -> &SsdpResult {
        &self.ssdp
    }

    pub fn description(&self) -> Option<&DeviceDescription> {
        self.description.as_ref()
    }

    /// URL de `description.xml` annoncée par `LOCATION`.
    pub fn description_url(&self) -> Option<String> {
        self.ssdp.location.as_ref().map(|location| location.to_url())
    }

    pub fn service_available(&self, id: &str) -> bool {
        self.service(id).is_some()
    }

    pub fn service(&self, id: &str) -> Option<&UpnpService> {
        self.description.as_ref().and_then(|d| d.service(id))
    }

    /// Résout un `controlURL` relatif contre `URLBase`, sinon contre l'URL
    /// de description.
    fn resolve_control_url(&self, control_url: &str) -> Result<String, ControlPointError> {
        let base = self
            .description
            .as_ref()
            .and_then(|d| d.url_base.clone())
            .or_else(|| self.description_url())
            .ok_or_else(|| ControlPointError::NoLocation(self.name()))?;

        let base = Url::parse(&base).map_err(|e| ControlPointError::InvalidUrl(format!("{}: {}", base, e)))?;
        let resolved = base
            .join(control_url)
            .map_err(|e| ControlPointError::InvalidUrl(format!("{}: {}", control_url, e)))?;
        Ok(resolved.to_string())
    }

    /// Invoque une action sur le service `id`.
    ///
    /// Le statut HTTP et un éventuel SOAP Fault de la réponse sont vérifiés.
    pub fn use_service(
        &self,
        id: &str,
        parameter: &ServiceParameter,
    ) -> Result<SoapCallResult, ControlPointError> {
        if !self.is_connected() {
            return Err(ControlPointError::NotConnected(self.name()));
        }
        let service = self
            .service(id)
            .ok_or_else(|| ControlPointError::service_unavailable(&self.name(), id))?;
        let control_url = self.resolve_control_url(&service.control_url)?;

        let args: Vec<(&str, &str)> = parameter
            .args
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        let call_result = invoke_upnp_action(
            &control_url,
            &service.service_type,
            &parameter.action,
            &args,
            self.http_timeout,
        )
        .map_err(|e| ControlPointError::SoapAction(format!("{}: {:#}", parameter.action, e)))?;

        handle_action_response(&parameter.action, &call_result)?;
        debug!("✅ {}::{} on {}", id, parameter.action, self.name());
        Ok(call_result)
    }

    /// `SetAVTransportURI` puis `Play` à la vitesse 1.
    pub fn play_media(&self, url: &str, mime_type: &str) -> Result<(), ControlPointError> {
        let set_uri = ServiceParameter::instance("SetAVTransportURI")
            .arg("CurrentURI", url)
            .arg("CurrentURIMetaData", didl_metadata(url, mime_type));
        self.use_service(AV_TRANSPORT, &set_uri)?;

        self.use_service(AV_TRANSPORT, &ServiceParameter::instance("Play").arg("Speed", "1"))?;
        info!("▶️ {} playing {}", self.name(), url);
        Ok(())
    }

    pub fn stop(&self) -> Result<(), ControlPointError> {
        self.use_service(AV_TRANSPORT, &ServiceParameter::instance("Stop"))?;
        Ok(())
    }
}

/// DIDL-Lite minimal décrivant la ressource, exigé par certains renderers.
fn didl_metadata(url: &str, mime_type: &str) -> String {
    let escape = |s: &str| {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    };
    let title = url.rsplit('/').next().filter(|t| !t.is_empty()).unwrap_or(url);
    let class = match mime_type.split('/').next() {
        Some("audio") => "object.item.audioItem.musicTrack",
        Some("image") => "object.item.imageItem.photo",
        _ => "object.item.videoItem",
    };

    format!(
        concat!(
            r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" "#,
            r#"xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">"#,
            r#"<item id="0" parentID="-1" restricted="1">"#,
            r#"<dc:title>{}</dc:title><upnp:class>{}</upnp:class>"#,
            r#"<res protocolInfo="http-get:*:{}:*">{}</res>"#,
            r#"</item></DIDL-Lite>"#
        ),
        escape(title),
        class,
        escape(mime_type),
        escape(url)
    )
}

impl Named for UpnpDevice {
    /// `friendlyName` une fois la description lue, sinon l'USN.
    fn name(&self) -> String {
        self.description
            .as_ref()
            .and_then(|d| d.friendly_name.clone())
            .unwrap_or_else(|| self.ssdp.usn.clone())
    }
}

impl DeviceConnection for UpnpDevice {
    /// Télécharge et parse `description.xml`.
    fn connect(&mut self) -> Result<(), ControlPointError> {
        let url = self
            .description_url()
            .ok_or_else(|| ControlPointError::NoLocation(self.ssdp.usn.clone()))?;
        debug!("Fetching description for {} at {}", self.ssdp.usn, url);

        let config = Agent::config_builder()
            .timeout_global(Some(self.http_timeout))
            .build();
        let agent: Agent = config.into();

        let fetch_error = |reason: String| ControlPointError::DescriptionFetch {
            url: url.clone(),
            reason,
        };
        let mut response = agent.get(&url).call().map_err(|e| fetch_error(e.to_string()))?;
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| fetch_error(e.to_string()))?;

        let description = match parse_device_description(&body) {
            Ok(description) => description,
            Err(e) => {
                warn!("❌ Unusable description at {}: {}", url, e);
                return Err(e.into());
            }
        };

        info!(
            "✅ Connected to UPnP device {} ({} services)",
            description.friendly_name.as_deref().unwrap_or(&self.ssdp.usn),
            description.services.len()
        );
        self.description = Some(description);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.description = None;
    }

    fn is_connected(&self) -> bool {
        self.description.is_some()
    }
}

impl VolumeControl for UpnpDevice {
    /// RenderingControl `SetVolume` sur le canal Master (0 à 100).
    fn set_volume(&self, level: f32) -> Result<(), ControlPointError> {
        let volume = (level.clamp(0.0, 1.0) * 100.0).round() as u16;
        let parameter = ServiceParameter::instance("SetVolume")
            .arg("Channel", "Master")
            .arg("DesiredVolume", volume.to_string());
        self.use_service(RENDERING_CONTROL, &parameter)?;
        Ok(())
    }

    fn set_muted(&self, muted: bool) -> Result<(), ControlPointError> {
        let parameter = ServiceParameter::instance("SetMute")
            .arg("Channel", "Master")
            .arg("DesiredMute", if muted { "1" } else { "0" });
        self.use_service(RENDERING_CONTROL, &parameter)?;
        Ok(())
    }
}

impl MediaControl for UpnpDevice {
    fn load_media(&self, url: &str, mime_type: &str) -> Result<(), ControlPointError> {
        self.play_media(url, mime_type)
    }

    fn close_app(&self) -> Result<(), ControlPointError> {
        self.stop()
    }
}
