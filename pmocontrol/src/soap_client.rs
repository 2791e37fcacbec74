use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use pmoupnp::soap::{SoapEnvelope, build_soap_request, parse_soap_envelope, parse_upnp_error, soap_action_header};
use tracing::{debug, trace};
use ureq::Agent;

use crate::errors::ControlPointError;

/// Result of a SOAP call:
/// - HTTP status code
/// - raw XML body (always)
/// - parsed SOAP envelope if parsing succeeded
#[derive(Debug)]
pub struct SoapCallResult {
    pub status: ureq::http::StatusCode,
    pub raw_body: String,
    pub envelope: Option<SoapEnvelope>,
}

impl SoapCallResult {
    /// Output arguments of `<action>Response`, empty when the body carries none.
    pub fn output_args(&self, action: &str) -> HashMap<String, String> {
        self.envelope
            .as_ref()
            .and_then(|env| env.action_response(action))
            .unwrap_or_default()
    }
}

/// Invoke a UPnP SOAP action on a control URL.
///
/// - `control_url`: full HTTP URL of the service control endpoint
/// - `service_type`: service URN, e.g. "urn:schemas-upnp-org:service:AVTransport:1"
/// - `action`: action name, e.g. "SetAVTransportURI"
/// - `args`: list of (name, value) pairs, e.g. &[("InstanceID", "0")]
///
/// Each call uses its own connection; nothing is kept between calls.
pub fn invoke_upnp_action(
    control_url: &str,
    service_type: &str,
    action: &str,
    args: &[(&str, &str)],
    timeout: Duration,
) -> Result<SoapCallResult> {
    let body_xml = build_soap_request(service_type, action, args)
        .context("Failed to build SOAP request body")?;

    // 4xx/5xx are not errors here: a SOAP fault comes back with HTTP 500
    // and its body must still be read.
    let config = Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();

    let agent: Agent = config.into();

    debug!("📤 SOAP {} -> {}", action, control_url);
    trace!("SOAP request body\n{}", body_xml);

    let mut response = agent
        .post(control_url)
        .header("Content-Type", r#"text/xml; charset="utf-8""#)
        .header("SOAPAction", &soap_action_header(service_type, action))
        .send(body_xml)
        .with_context(|| format!("HTTP error when sending SOAP request to {}", control_url))?;

    let status = response.status();

    let raw_body = response
        .body_mut()
        .read_to_string()
        .context("Failed to read SOAP response body")?;

    debug!("📥 SOAP {} answered with HTTP {}", action, status);

    // A body that is not a SOAP envelope is kept raw.
    let envelope = parse_soap_envelope(raw_body.as_bytes()).ok();

    Ok(SoapCallResult {
        status,
        raw_body,
        envelope,
    })
}

/// Turns a non-2xx answer into an error, preferring the UPnP fault when present.
pub fn ensure_success(action: &str, call_result: &SoapCallResult) -> Result<(), ControlPointError> {
    if call_result.status.is_success() {
        return Ok(());
    }

    if let Some(env) = &call_result.envelope {
        if let Some(err) = parse_upnp_error(env) {
            return Err(ControlPointError::SoapUpnpError(
                action.to_string(),
                err.error_code,
                err.error_description,
                call_result.status.as_u16(),
            ));
        }
    }

    Err(ControlPointError::SoapActionWrongBody(
        action.to_string(),
        call_result.status.as_u16(),
        call_result.raw_body.clone(),
    ))
}

pub fn handle_action_response(action: &str, call_result: &SoapCallResult) -> Result<(), ControlPointError> {
    ensure_success(action, call_result)?;

    if let Some(env) = &call_result.envelope {
        if let Some(err) = parse_upnp_error(env) {
            return Err(ControlPointError::SoapUpnpError(
                action.to_string(),
                err.error_code,
                err.error_description,
                call_result.status.as_u16(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ureq::http::StatusCode;

    const AVT_URN: &str = "urn:schemas-upnp-org:service:AVTransport:1";

    fn envelope(body: &str) -> String {
        format!(
            r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>{}</s:Body></s:Envelope>"#,
            body
        )
    }

    fn call_result(status: StatusCode, body: String) -> SoapCallResult {
        SoapCallResult {
            status,
            envelope: parse_soap_envelope(body.as_bytes()).ok(),
            raw_body: body,
        }
    }

    #[test]
    fn test_success() {
        let body = envelope(&format!(r#"<u:PlayResponse xmlns:u="{}"/>"#, AVT_URN));
        let result = call_result(StatusCode::OK, body);
        assert!(handle_action_response("Play", &result).is_ok());
        assert!(result.output_args("Play").is_empty());
    }

    #[test]
    fn test_output_args() {
        let body = envelope(&format!(
            r#"<u:GetTransportInfoResponse xmlns:u="{}"><CurrentTransportState>PLAYING</CurrentTransportState><CurrentSpeed>1</CurrentSpeed></u:GetTransportInfoResponse>"#,
            AVT_URN
        ));
        let result = call_result(StatusCode::OK, body);

        let args = result.output_args("GetTransportInfo");
        assert_eq!(args["CurrentTransportState"], "PLAYING");
        assert_eq!(args["CurrentSpeed"], "1");
        assert!(result.output_args("GetPositionInfo").is_empty());
    }

    #[test]
    fn test_upnp_fault() {
        let body = envelope(
            r#"<s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring><detail><UPnPError xmlns="urn:schemas-upnp-org:control-1-0"><errorCode>701</errorCode><errorDescription>Transition not available</errorDescription></UPnPError></detail></s:Fault>"#,
        );
        let result = call_result(StatusCode::INTERNAL_SERVER_ERROR, body);

        match handle_action_response("Play", &result) {
            Err(ControlPointError::SoapUpnpError(action, code, description, status)) => {
                assert_eq!(action, "Play");
                assert_eq!(code, 701);
                assert_eq!(description, "Transition not available");
                assert_eq!(status, 500);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_plain_http_error() {
        let result = call_result(StatusCode::NOT_FOUND, "Not Found".to_string());
        assert!(result.envelope.is_none());
        assert!(matches!(
            ensure_success("Stop", &result),
            Err(ControlPointError::SoapActionWrongBody(_, 404, body)) if body == "Not Found"
        ));
    }
}
