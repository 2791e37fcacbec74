//! # pmocontrol - control point Cast / UPnP
//!
//! Découvre les récepteurs du réseau local et les pilote derrière une façade
//! unique, [`Device`].
//!
//! ## Architecture
//!
//! - [`capabilities`] : traits `Named`, `DeviceConnection`, `VolumeControl`, `MediaControl`
//! - [`CastDevice`] : récepteur Google Cast (session [`pmocast::CastSession`])
//! - [`UpnpDevice`] : renderer UPnP/DLNA (description + actions SOAP)
//! - [`discover_devices`] : mDNS et SSDP en parallèle
//!
//! ## Example
//!
//! ```ignore
//! use pmocontrol::{DeviceConnection, MediaControl, Named, discover_devices};
//!
//! let mut devices = discover_devices(&pmoconfig::get_config());
//! let device = &mut devices[0];
//! device.connect()?;
//! device.load_media("http://192.168.1.10:8080/movie.mp4", "video/mp4")?;
//! ```

pub mod capabilities;
mod cast_device;
mod config_ext;
mod device;
pub mod discovery;
pub mod errors;
pub mod soap_client;
mod upnp_device;

pub use capabilities::{DeviceConnection, MediaControl, Named, VolumeControl};
pub use cast_device::CastDevice;
pub use config_ext::ControlConfigExt;
pub use device::Device;
pub use discovery::{discover_cast_devices, discover_devices, discover_upnp_devices};
pub use errors::ControlPointError;
pub use soap_client::{SoapCallResult, invoke_upnp_action};
pub use upnp_device::{AV_TRANSPORT, RENDERING_CONTROL, ServiceParameter, UpnpDevice};
