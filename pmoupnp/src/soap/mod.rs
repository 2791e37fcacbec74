//! # Module SOAP - côté control point
//!
//! Construction des appels d'action UPnP et lecture de ce que le device
//! renvoie : la réponse `<Action>Response` ou un SOAP Fault portant une
//! `UPnPError`.
//!
//! ## Example
//!
//! ```ignore
//! use pmoupnp::soap::{build_soap_request, parse_soap_envelope, parse_upnp_error};
//!
//! let body = build_soap_request(
//!     "urn:schemas-upnp-org:service:AVTransport:1",
//!     "Play",
//!     &[("InstanceID", "0"), ("Speed", "1")],
//! )?;
//! // ... POST vers le controlURL ...
//! let envelope = parse_soap_envelope(response.as_bytes())?;
//! if let Some(err) = parse_upnp_error(&envelope) {
//!     eprintln!("UPnP error {}: {}", err.error_code, err.error_description);
//! }
//! ```

mod envelope;
mod fault;
mod request;

pub use envelope::{SoapEnvelope, SoapParseError, parse_soap_envelope};
pub use fault::{UpnpError, parse_upnp_error};
pub use request::{build_soap_request, soap_action_header};

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_ENCODING: &str = "http://schemas.xmlsoap.org/soap/encoding/";
