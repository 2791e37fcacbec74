//! # pmoupnp - découverte SSDP et contrôle UPnP
//!
//! Côté *control point* uniquement : on cherche des renderers, on lit leur
//! description et on prépare/décode les appels SOAP. Le transport HTTP des
//! actions est laissé à `pmocontrol`.
//!
//! ## Architecture
//!
//! - [`ssdp`] : M-SEARCH, parsing des réponses et de `LOCATION`, fenêtre de collecte
//! - [`description`] : parsing de `description.xml` (services, embedded devices)
//! - [`soap`] : construction des requêtes SOAP, parsing des enveloppes et des fautes UPnP

pub mod description;
pub mod soap;
pub mod ssdp;

pub use description::{DescriptionError, DeviceDescription, UpnpService, parse_device_description};
pub use ssdp::{SsdpClient, SsdpConfig, SsdpLocation, SsdpParseError, SsdpResult};
