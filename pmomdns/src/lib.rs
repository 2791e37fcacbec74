//! # pmomdns - découverte mDNS minimale
//!
//! Encodage/décodage du format binaire DNS utilisé par mDNS, et collecte des
//! réponses à une requête PTR multicast pendant une fenêtre de temps fixe.
//!
//! ## Architecture
//!
//! - [`codec`] : en-tête DNS, noms compressés, requêtes et réponses
//! - [`records`] : types d'enregistrements et parseurs A / PTR / SRV / TXT
//! - [`discovery`] : [`MdnsDiscovery`], un tour de découverte sur le groupe multicast
//!
//! ## Constantes mDNS
//!
//! - **Multicast Address**: 224.0.0.251:5353
//! - **Collection window**: 5000 ms par défaut

pub mod codec;
pub mod discovery;
mod errors;
pub mod records;

use std::net::Ipv4Addr;

pub use codec::{DecodedResponse, DnsHeader, build_query, decode_response};
pub use discovery::{MdnsConfig, MdnsDiscovery, MdnsResult};
pub use errors::MdnsError;
pub use records::{MdnsRecord, RecordType, SrvRecord};

/// Adresse multicast mDNS
pub const MDNS_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// Port mDNS
pub const MDNS_PORT: u16 = 5353;

/// Service annoncé par les récepteurs Google Cast
pub const GOOGLECAST_SERVICE: &str = "_googlecast._tcp.local";
