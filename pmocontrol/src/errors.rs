use pmocast::CastError;
use pmoupnp::DescriptionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlPointError {
    #[error("Device {0} is not connected")]
    NotConnected(String),
    #[error("Device {0} did not announce a description LOCATION")]
    NoLocation(String),
    #[error("Device {device} exposes no {service} service")]
    ServiceUnavailable { device: String, service: String },
    #[error("Cannot fetch description from {url}: {reason}")]
    DescriptionFetch { url: String, reason: String },
    #[error("Invalid device description: {0}")]
    Description(#[from] DescriptionError),
    #[error("Invalid URL {0}")]
    InvalidUrl(String),
    #[error("Soap Error: Upnp action call {0}")]
    SoapAction(String),
    #[error("{0} returned UPnP error {1}: {2} (HTTP status {3})")]
    SoapUpnpError(String, u32, String, u16),
    #[error("{0} failed with HTTP status {1} and body: {2}")]
    SoapActionWrongBody(String, u16, String),
    #[error("Cast Error: {0}")]
    Cast(#[from] CastError),
    #[error("Discovery Error: {0}")]
    Discovery(String),
}

impl ControlPointError {
    pub fn service_unavailable(device: &str, service: &str) -> Self {
        ControlPointError::ServiceUnavailable {
            device: device.to_string(),
            service: service.to_string(),
        }
    }
}
