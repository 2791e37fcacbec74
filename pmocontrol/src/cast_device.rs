//! Récepteur Google Cast découvert par mDNS.

use std::net::{IpAddr, SocketAddr};

use pmocast::{
    CAST_PORT, CastSession, DefaultMediaReceiver, MediaRequest, SessionConfig, TlsIdentity,
    TransportConfig,
};
use pmomdns::MdnsResult;
use tracing::{debug, info};

use crate::capabilities::{DeviceConnection, MediaControl, Named, VolumeControl};
use crate::errors::ControlPointError;

pub struct CastDevice {
    name: String,
    addr: SocketAddr,
    identity: TlsIdentity,
    transport_config: TransportConfig,
    session_config: SessionConfig,
    session: Option<CastSession>,
}

impl CastDevice {
    pub fn new(name: impl Into<String>, addr: SocketAddr, identity: TlsIdentity) -> Self {
        Self {
            name: name.into(),
            addr,
            identity,
            transport_config: TransportConfig::default(),
            session_config: SessionConfig::default(),
            session: None,
        }
    }

    /// Construit le device à partir d'une réponse mDNS.
    ///
    /// - nom : clé TXT `fn`, sinon instance du PTR, sinon adresse du pair
    /// - hôte : premier enregistrement A, sinon adresse du pair
    /// - port : SRV, sinon 8009
    pub fn from_mdns(result: &MdnsResult, identity: TlsIdentity) -> Self {
        let host = result
            .addresses()
            .first()
            .map(|ip| IpAddr::V4(*ip))
            .unwrap_or_else(|| result.peer.ip());
        let port = result.srv().map(|srv| srv.port).unwrap_or(CAST_PORT);

        let name = result
            .txt()
            .remove("fn")
            .filter(|name| !name.is_empty())
            .or_else(|| result.instance_name())
            .unwrap_or_else(|| host.to_string());

        debug!("Cast device {} at {}:{}", name, host, port);
        Self::new(name, SocketAddr::new(host, port), identity)
    }

    pub fn with_configs(mut self, transport: TransportConfig, session: SessionConfig) -> Self {
        self.transport_config = transport;
        self.session_config = session;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn session(&self) -> Option<&CastSession> {
        self.session.as_ref()
    }

    fn connected_session(&self) -> Result<&CastSession, ControlPointError> {
        self.session
            .as_ref()
            .filter(|session| session.is_connected())
            .ok_or_else(|| ControlPointError::NotConnected(self.name.clone()))
    }
}

impl Named for CastDevice {
    fn name(&self) -> String {
        self.name.clone()
    }
}

impl DeviceConnection for CastDevice {
    fn connect(&mut self) -> Result<(), ControlPointError> {
        if self.is_connected() {
            return Ok(());
        }
        let session = CastSession::connect(
            self.addr,
            &self.identity,
            self.transport_config.clone(),
            self.session_config.clone(),
        )?;
        info!("✅ Connected to cast device {}", self.name);
        self.session = Some(session);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.disconnect();
        }
    }

    fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(CastSession::is_connected)
    }
}

impl VolumeControl for CastDevice {
    fn set_volume(&self, level: f32) -> Result<(), ControlPointError> {
        Ok(self.connected_session()?.set_volume(level)?)
    }

    fn set_muted(&self, muted: bool) -> Result<(), ControlPointError> {
        Ok(self.connected_session()?.set_muted(muted)?)
    }
}

impl MediaControl for CastDevice {
    fn load_media(&self, url: &str, mime_type: &str) -> Result<(), ControlPointError> {
        let session = self.connected_session()?;
        let details = DefaultMediaReceiver::new(session).load(&MediaRequest::new(url, mime_type))?;
        info!("▶️ {} playing {} (transport {})", self.name, url, details.transport_id);
        Ok(())
    }

    fn close_app(&self) -> Result<(), ControlPointError> {
        Ok(self.connected_session()?.close_app()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmomdns::{MdnsRecord, RecordType};

    fn record(name: &str, rtype: RecordType, data: &[u8]) -> MdnsRecord {
        MdnsRecord {
            name: name.to_string(),
            rtype,
            data: data.to_vec(),
        }
    }

    fn response(records: Vec<MdnsRecord>) -> MdnsResult {
        MdnsResult {
            peer: "192.168.1.99:5353".parse().unwrap(),
            query_type: RecordType::Ptr,
            query_name: "_googlecast._tcp.local".to_string(),
            records,
        }
    }

    const PTR: &[u8] = b"\x0fChromecast-1234\x0b_googlecast\x04_tcp\x05local\x00";

    #[test]
    fn test_from_full_response() {
        let result = response(vec![
            record("_googlecast._tcp.local", RecordType::Ptr, PTR),
            record("Chromecast-1234._googlecast._tcp.local", RecordType::Txt, b"\x0bfn=Salon TV\x07md=Cast"),
            record(
                "Chromecast-1234._googlecast._tcp.local",
                RecordType::Srv,
                b"\x00\x00\x00\x00\x1f\x4a\x08cast-abc\x05local\x00",
            ),
            record("cast-abc.local", RecordType::A, &[192, 168, 1, 30]),
        ]);

        let device = CastDevice::from_mdns(&result, TlsIdentity::default());
        assert_eq!(device.name(), "Salon TV");
        assert_eq!(device.addr(), "192.168.1.30:8010".parse::<SocketAddr>().unwrap());
        assert!(!device.is_connected());
    }

    #[test]
    fn test_from_minimal_response() {
        let result = response(vec![record("_googlecast._tcp.local", RecordType::Ptr, PTR)]);

        let device = CastDevice::from_mdns(&result, TlsIdentity::default());
        assert_eq!(device.name(), "Chromecast-1234");
        assert_eq!(device.addr(), "192.168.1.99:8009".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_control_before_connect() {
        let device = CastDevice::new("Salon TV", "192.168.1.30:8009".parse().unwrap(), TlsIdentity::default());
        assert!(matches!(device.close_app(), Err(ControlPointError::NotConnected(_))));
        assert!(matches!(device.set_muted(true), Err(ControlPointError::NotConnected(_))));
    }
}
