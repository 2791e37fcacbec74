//! SOAP Faults portant une erreur UPnP

use xmltree::Element;

use super::SoapEnvelope;
use super::envelope::{child_elements, local_name};

/// Erreur UPnP portée par le `detail` d'un SOAP Fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpError {
    /// Code d'erreur UPnP (ex: 401, 501, 714)
    pub error_code: u32,

    /// Description de l'erreur, vide si le device n'en fournit pas
    pub error_description: String,
}

/// Extrait l'erreur UPnP d'une enveloppe contenant un SOAP Fault.
///
/// Retourne `None` si le corps n'est pas un Fault, ou si le Fault ne porte
/// pas de `UPnPError` avec un `errorCode` numérique.
pub fn parse_upnp_error(envelope: &SoapEnvelope) -> Option<UpnpError> {
    let detail = child(envelope.fault()?, "detail")?;
    let upnp_error = child(detail, "UPnPError")?;

    let error_code = text(upnp_error, "errorCode")?.parse::<u32>().ok()?;
    let error_description = text(upnp_error, "errorDescription").unwrap_or_default();

    Some(UpnpError {
        error_code,
        error_description,
    })
}

fn child<'a>(parent: &'a Element, name: &str) -> Option<&'a Element> {
    child_elements(parent).find(|e| local_name(e) == name)
}

fn text(parent: &Element, name: &str) -> Option<String> {
    child(parent, name)?.get_text().map(|t| t.trim().to_string())
}
