//! Construction des configurations de découverte et de session à partir de
//! `pmoconfig`.
//!
//! Les crates protocolaires n'exposent que des structures `Default` ; ce trait
//! les remplit depuis la configuration globale.

use std::time::Duration;

use anyhow::Result;
use pmocast::{SessionConfig, TlsIdentity, TransportConfig};
use pmoconfig::Config;
use pmomdns::MdnsConfig;
use pmoupnp::SsdpConfig;

/// Trait d'extension de `pmoconfig::Config` pour le control point
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmocontrol::ControlConfigExt;
///
/// let config = get_config();
/// let session = config.cast_session_config()?;
/// ```
pub trait ControlConfigExt {
    fn mdns_config(&self) -> Result<MdnsConfig>;
    fn ssdp_config(&self) -> Result<SsdpConfig>;
    fn cast_transport_config(&self) -> Result<TransportConfig>;
    fn cast_session_config(&self) -> Result<SessionConfig>;
    /// Certificat client pour le canal Cast (absent par défaut)
    fn cast_tls_identity(&self) -> TlsIdentity;
    fn upnp_http_timeout(&self) -> Result<Duration>;
}

impl ControlConfigExt for Config {
    fn mdns_config(&self) -> Result<MdnsConfig> {
        Ok(MdnsConfig {
            window: Duration::from_millis(self.get_mdns_window_ms()?),
            validate_flags: self.get_mdns_validate_flags()?,
            ..MdnsConfig::default()
        })
    }

    fn ssdp_config(&self) -> Result<SsdpConfig> {
        Ok(SsdpConfig {
            window: Duration::from_millis(self.get_ssdp_window_ms()?),
            mx: u32::try_from(self.get_ssdp_mx()?)?,
            ..SsdpConfig::default()
        })
    }

    fn cast_transport_config(&self) -> Result<TransportConfig> {
        Ok(TransportConfig {
            request_timeout: Duration::from_millis(self.get_cast_request_timeout_ms()?),
            heartbeat_interval: Duration::from_millis(self.get_cast_heartbeat_interval_ms()?),
            ..TransportConfig::default()
        })
    }

    fn cast_session_config(&self) -> Result<SessionConfig> {
        Ok(SessionConfig {
            poll_attempts: u32::try_from(self.get_cast_launch_poll_attempts()?)?,
            poll_interval: Duration::from_millis(self.get_cast_launch_poll_interval_ms()?),
            load_timeout: Duration::from_millis(self.get_cast_load_timeout_ms()?),
        })
    }

    fn cast_tls_identity(&self) -> TlsIdentity {
        TlsIdentity {
            certificate: self.get_cast_certificate(),
            private_key: self.get_cast_private_key(),
        }
    }

    fn upnp_http_timeout(&self) -> Result<Duration> {
        Ok(Duration::from_secs(self.get_upnp_http_timeout_secs()?))
    }
}
