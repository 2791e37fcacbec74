//! Façade commune : un device est soit un récepteur Cast, soit un renderer UPnP.

use crate::capabilities::{DeviceConnection, MediaControl, Named, VolumeControl};
use crate::cast_device::CastDevice;
use crate::errors::ControlPointError;
use crate::upnp_device::UpnpDevice;

pub enum Device {
    Cast(CastDevice),
    Upnp(UpnpDevice),
}

impl Device {
    /// Protocole du device, pour l'affichage
    pub fn protocol(&self) -> &'static str {
        match self {
            Device::Cast(_) => "cast",
            Device::Upnp(_) => "upnp",
        }
    }
}

impl From<CastDevice> for Device {
    fn from(device: CastDevice) -> Self {
        Device::Cast(device)
    }
}

impl From<UpnpDevice> for Device {
    fn from(device: UpnpDevice) -> Self {
        Device::Upnp(device)
    }
}

impl Named for Device {
    fn name(&self) -> String {
        match self {
            Device::Cast(d) => d.name(),
            Device::Upnp(d) => d.name(),
        }
    }
}

impl DeviceConnection for Device {
    fn connect(&mut self) -> Result<(), ControlPointError> {
        match self {
            Device::Cast(d) => d.connect(),
            Device::Upnp(d) => d.connect(),
        }
    }

    fn disconnect(&mut self) {
        match self {
            Device::Cast(d) => d.disconnect(),
            Device::Upnp(d) => d.disconnect(),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Device::Cast(d) => d.is_connected(),
            Device::Upnp(d) => d.is_connected(),
        }
    }
}

impl VolumeControl for Device {
    fn set_volume(&self, level: f32) -> Result<(), ControlPointError> {
        match self {
            Device::Cast(d) => d.set_volume(level),
            Device::Upnp(d) => d.set_volume(level),
        }
    }

    fn set_muted(&self, muted: bool) -> Result<(), ControlPointError> {
        match self {
            Device::Cast(d) => d.set_muted(muted),
            Device::Upnp(d) => d.set_muted(muted),
        }
    }
}

impl MediaControl for Device {
    fn load_media(&self, url: &str, mime_type: &str) -> Result<(), ControlPointError> {
        match self {
            Device::Cast(d) => d.load_media(url, mime_type),
            Device::Upnp(d) => d.load_media(url, mime_type),
        }
    }

    fn close_app(&self) -> Result<(), ControlPointError> {
        match self {
            Device::Cast(d) => d.close_app(),
            Device::Upnp(d) => d.close_app(),
        }
    }
}
