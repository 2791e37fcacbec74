//! Découverte : mDNS pour les récepteurs Cast, SSDP pour les renderers UPnP.

use std::thread;

use pmoconfig::Config;
use pmomdns::MdnsDiscovery;
use pmoupnp::SsdpClient;
use tracing::{info, warn};

use crate::cast_device::CastDevice;
use crate::config_ext::ControlConfigExt;
use crate::device::Device;
use crate::errors::ControlPointError;
use crate::upnp_device::UpnpDevice;

fn config_error(e: anyhow::Error) -> ControlPointError {
    ControlPointError::Discovery(format!("invalid configuration: {:#}", e))
}

/// Un tour mDNS sur le service configuré (`_googlecast._tcp.local`).
pub fn discover_cast_devices(config: &Config) -> Result<Vec<CastDevice>, ControlPointError> {
    let service = config.get_mdns_service().map_err(config_error)?;
    let discovery = MdnsDiscovery::new(config.mdns_config().map_err(config_error)?);
    let transport = config.cast_transport_config().map_err(config_error)?;
    let session = config.cast_session_config().map_err(config_error)?;
    let identity = config.cast_tls_identity();

    let results = discovery
        .discover(&service)
        .map_err(|e| ControlPointError::Discovery(e.to_string()))?;

    Ok(results
        .iter()
        .map(|result| {
            CastDevice::from_mdns(result, identity.clone())
                .with_configs(transport.clone(), session.clone())
        })
        .collect())
}

/// Un tour SSDP ; les réponses sans `LOCATION` ne donnent pas de device.
pub fn discover_upnp_devices(config: &Config) -> Result<Vec<UpnpDevice>, ControlPointError> {
    let search_target = config.get_ssdp_search_target().map_err(config_error)?;
    let client = SsdpClient::new(config.ssdp_config().map_err(config_error)?);
    let timeout = config.upnp_http_timeout().map_err(config_error)?;

    let results = client
        .search(&search_target)
        .map_err(|e| ControlPointError::Discovery(e.to_string()))?;

    Ok(results
        .into_iter()
        .filter(|result| result.location.is_some())
        .map(|result| UpnpDevice::from_ssdp(result).with_http_timeout(timeout))
        .collect())
}

/// Lance les deux découvertes en parallèle et réunit leurs devices.
///
/// L'échec de l'une n'empêche pas l'autre d'aboutir.
pub fn discover_devices(config: &Config) -> Vec<Device> {
    let (cast, upnp) = thread::scope(|scope| {
        let cast = scope.spawn(|| discover_cast_devices(config));
        let upnp = discover_upnp_devices(config);
        let cast = cast
            .join()
            .unwrap_or_else(|_| Err(ControlPointError::Discovery("mDNS discovery panicked".to_string())));
        (cast, upnp)
    });

    let mut devices: Vec<Device> = Vec::new();
    match cast {
        Ok(found) => devices.extend(found.into_iter().map(Device::from)),
        Err(e) => warn!("❌ Cast discovery failed: {}", e),
    }
    match upnp {
        Ok(found) => devices.extend(found.into_iter().map(Device::from)),
        Err(e) => warn!("❌ UPnP discovery failed: {}", e),
    }

    info!("✅ {} device(s) discovered", devices.len());
    devices
}
