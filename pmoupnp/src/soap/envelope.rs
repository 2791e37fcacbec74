//! Lecture des enveloppes SOAP renvoyées par un device

use std::collections::HashMap;

use xmltree::Element;

#[derive(Debug, thiserror::Error)]
pub enum SoapParseError {
    #[error("XML parse error: {0}")]
    XmlError(#[from] xmltree::ParseError),

    #[error("root element <{0}> is not a SOAP Envelope")]
    NotAnEnvelope(String),

    #[error("SOAP Envelope without Body")]
    MissingBody,
}

/// Réponse SOAP d'un device ; seul le `Body` est conservé.
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    body: Element,
}

impl SoapEnvelope {
    pub fn body(&self) -> &Element {
        &self.body
    }

    /// Premier élément du corps : `<u:ActionResponse>` ou `<s:Fault>`.
    pub fn payload(&self) -> Option<&Element> {
        child_elements(&self.body).next()
    }

    pub fn fault(&self) -> Option<&Element> {
        self.payload().filter(|e| local_name(e) == "Fault")
    }

    pub fn is_fault(&self) -> bool {
        self.fault().is_some()
    }

    /// Arguments de sortie de `<action>Response`.
    ///
    /// `None` si le corps porte autre chose que la réponse à `action`.
    pub fn action_response(&self, action: &str) -> Option<HashMap<String, String>> {
        let payload = self.payload()?;
        if local_name(payload) != format!("{}Response", action) {
            return None;
        }

        Some(
            child_elements(payload)
                .map(|arg| {
                    let value = arg.get_text().map(|t| t.into_owned()).unwrap_or_default();
                    (local_name(arg).to_string(), value)
                })
                .collect(),
        )
    }
}

/// Parse une enveloppe SOAP ; les préfixes de namespace sont ignorés.
pub fn parse_soap_envelope(xml: &[u8]) -> Result<SoapEnvelope, SoapParseError> {
    let root = Element::parse(xml)?;
    if local_name(&root) != "Envelope" {
        return Err(SoapParseError::NotAnEnvelope(root.name));
    }

    let body = child_elements(&root)
        .find(|e| local_name(e) == "Body")
        .ok_or(SoapParseError::MissingBody)?;

    Ok(SoapEnvelope { body: body.clone() })
}

pub(crate) fn child_elements(parent: &Element) -> impl Iterator<Item = &Element> {
    parent.children.iter().filter_map(|n| n.as_element())
}

pub(crate) fn local_name(element: &Element) -> &str {
    element.name.rsplit(':').next().unwrap_or(&element.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GET_VOLUME_RESPONSE: &str = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Header><t:Trace xmlns:t="urn:x-test">1</t:Trace></s:Header>
  <s:Body>
    <u:GetVolumeResponse xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1">
      <CurrentVolume>42</CurrentVolume>
    </u:GetVolumeResponse>
  </s:Body>
</s:Envelope>"#;

    #[test]
    fn test_action_response_arguments() {
        let envelope = parse_soap_envelope(GET_VOLUME_RESPONSE.as_bytes()).unwrap();
        assert!(!envelope.is_fault());

        let args = envelope.action_response("GetVolume").unwrap();
        assert_eq!(args["CurrentVolume"], "42");
        assert!(envelope.action_response("GetMute").is_none());
    }

    #[test]
    fn test_empty_response() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:StopResponse xmlns:u="urn:schemas-upnp-org:service:AVTransport:1"/></s:Body></s:Envelope>"#;
        let envelope = parse_soap_envelope(xml.as_bytes()).unwrap();
        assert_eq!(envelope.action_response("Stop"), Some(HashMap::new()));
    }

    #[test]
    fn test_not_an_envelope() {
        assert!(matches!(
            parse_soap_envelope(b"<html><body/></html>"),
            Err(SoapParseError::NotAnEnvelope(name)) if name == "html"
        ));
        assert!(matches!(
            parse_soap_envelope(b"<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"/>"),
            Err(SoapParseError::MissingBody)
        ));
        assert!(matches!(
            parse_soap_envelope(b"not xml at all"),
            Err(SoapParseError::XmlError(_))
        ));
    }
}
