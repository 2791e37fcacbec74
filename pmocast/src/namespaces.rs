//! Namespaces et identifiants du protocole Cast.

pub const CONNECTION: &str = "urn:x-cast:com.google.cast.tp.connection";
pub const HEARTBEAT: &str = "urn:x-cast:com.google.cast.tp.heartbeat";
pub const RECEIVER: &str = "urn:x-cast:com.google.cast.receiver";
pub const MEDIA: &str = "urn:x-cast:com.google.cast.media";

/// Identifiant de l'émetteur (nous)
pub const SENDER_ID: &str = "sender-0";

/// Destination par défaut : la plateforme du récepteur
pub const RECEIVER_ID: &str = "receiver-0";
