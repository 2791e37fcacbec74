//! # Module SSDP - Simple Service Discovery Protocol
//!
//! Recherche active des devices UPnP : un `M-SEARCH` multicast, puis
//! collecte des réponses unicast pendant une fenêtre fixe.
//!
//! ## Fonctionnalités
//!
//! - ✅ Construction du `M-SEARCH`
//! - ✅ Parsing des réponses (en-têtes insensibles à la casse)
//! - ✅ Décomposition de `LOCATION` en hôte / port / chemin
//! - ✅ Déduplication par (USN, LOCATION) sur une fenêtre
//!
//! ## Constants SSDP
//!
//! - **Multicast Address**: 239.255.255.250:1900
//! - **Collection window**: 5000 ms par défaut

mod client;
mod message;

use std::net::Ipv4Addr;
use std::time::Duration;

pub use client::SsdpClient;
pub use message::{
    SsdpLocation, SsdpParseError, SsdpResult, build_msearch, parse_location, parse_search_response,
};

/// Adresse multicast SSDP
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Port SSDP
pub const SSDP_PORT: u16 = 1900;

/// Cibles de recherche usuelles
pub mod search_targets {
    pub const ALL: &str = "ssdp:all";
    pub const ROOT_DEVICE: &str = "upnp:rootdevice";
    pub const MEDIA_RENDERER: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";
    pub const AV_TRANSPORT: &str = "urn:schemas-upnp-org:service:AVTransport:1";
    /// Découverte DIAL (applications de second écran)
    pub const DIAL: &str = "urn:dial-multiscreen-org:service:dial:1";
}

/// Paramètres d'un tour de recherche.
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    /// Durée de la fenêtre de collecte
    pub window: Duration,
    /// Délai de réponse maximal annoncé aux devices (`MX`, secondes)
    pub mx: u32,
    /// Timeout de lecture du socket
    pub read_timeout: Duration,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(5000),
            mx: 3,
            read_timeout: Duration::from_millis(100),
        }
    }
}
