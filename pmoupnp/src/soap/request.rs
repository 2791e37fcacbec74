//! Appels d'action UPnP

use xmltree::{Element, EmitterConfig, XMLNode};

use super::{SOAP_ENCODING, SOAP_ENVELOPE_NS};

/// En-tête HTTP `SOAPAction` : `"urn:service#Action"`, guillemets compris.
pub fn soap_action_header(service_type: &str, action: &str) -> String {
    format!(r#""{}#{}""#, service_type, action)
}

fn text_element(name: &str, text: &str) -> Element {
    let mut element = Element::new(name);
    element.children.push(XMLNode::Text(text.to_string()));
    element
}

/// Corps XML de l'appel `action` sur le service `service_type`.
///
/// Les arguments sont émis dans l'ordre donné, ce que certains renderers
/// exigent. Le texte est échappé à l'émission.
pub fn build_soap_request(
    service_type: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, xmltree::Error> {
    let mut call = Element::new(&format!("u:{}", action));
    call.attributes
        .insert("xmlns:u".to_string(), service_type.to_string());
    call.children.extend(
        args.iter()
            .map(|(name, value)| XMLNode::Element(text_element(name, value))),
    );

    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(call));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENVELOPE_NS.to_string());
    envelope
        .attributes
        .insert("s:encodingStyle".to_string(), SOAP_ENCODING.to_string());
    envelope.children.push(XMLNode::Element(body));

    let mut out = Vec::new();
    envelope.write_with_config(&mut out, EmitterConfig::new().write_document_declaration(true))?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
