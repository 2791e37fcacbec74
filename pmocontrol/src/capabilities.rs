// pmocontrol/src/capabilities.rs
//! Capacités communes aux devices Cast et UPnP.
//!
//! Le reste du programme manipule un [`crate::Device`] sans connaître le
//! protocole sous-jacent.

use crate::errors::ControlPointError;

/// Nom affichable, disponible même hors connexion.
pub trait Named {
    fn name(&self) -> String;
}

/// Cycle de vie de la connexion.
///
/// `connect()` doit réussir avant toute opération de contrôle.
pub trait DeviceConnection {
    fn connect(&mut self) -> Result<(), ControlPointError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
}

pub trait VolumeControl {
    /// `level` dans `0.0..=1.0`, ramené dans cet intervalle sinon.
    fn set_volume(&self, level: f32) -> Result<(), ControlPointError>;
    fn set_muted(&self, muted: bool) -> Result<(), ControlPointError>;
}

/// Lecture d'un média servi par le serveur HTTP local.
pub trait MediaControl {
    fn load_media(&self, url: &str, mime_type: &str) -> Result<(), ControlPointError>;

    /// Arrête la lecture (ferme l'application côté Cast).
    fn close_app(&self) -> Result<(), ControlPointError>;
}
