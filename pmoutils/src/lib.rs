//! Petits utilitaires partagés par les crates de découverte et de contrôle.
//!
//! - [`ByteReader`] : curseur borné sur un buffer binaire (DNS, protobuf Cast)
//! - [`guess_local_ip`] / [`list_ipv4_interfaces`] : adresses locales, utilisées
//!   pour rejoindre les groupes multicast et construire les URLs de média.
//! - [`send_multicast_v4`] : émission d'une requête de découverte sur chaque interface

mod byte_reader;
mod ip_utils;
mod multicast;

pub use byte_reader::{ByteReader, ByteReaderError};
pub use ip_utils::{guess_local_ip, list_ipv4_interfaces};
pub use multicast::send_multicast_v4;
