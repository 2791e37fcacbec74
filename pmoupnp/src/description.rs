//! Parsing de la description d'un device UPnP (`description.xml`).

use std::io::BufReader;

use thiserror::Error;
use tracing::{debug, trace};
use xmltree::Element;

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("XML parsing error: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("Missing required device element: {0}")]
    MissingField(&'static str),
}

/// Un service déclaré dans le `serviceList` d'un device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpService {
    /// Dernier segment du `serviceId`
    /// (`RenderingControl` pour `urn:upnp-org:serviceId:RenderingControl`)
    pub id: String,
    /// URN complet, ex. `urn:schemas-upnp-org:service:AVTransport:1`
    pub service_type: String,
    pub control_url: String,
    pub scpd_url: String,
    pub event_sub_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescription {
    pub udn: String,
    pub friendly_name: Option<String>,
    pub device_type: String,
    pub manufacturer: String,
    pub model_name: String,
    /// `URLBase` (UPnP 1.0) si présent
    pub url_base: Option<String>,
    /// Services du device racine puis des devices embarqués
    pub services: Vec<UpnpService>,
}

impl DeviceDescription {
    pub fn service(&self, id: &str) -> Option<&UpnpService> {
        self.services.iter().find(|s| s.id == id)
    }
}

/// Parse le document de description d'un device.
///
/// Les devices embarqués (`deviceList`) sont parcourus ; leurs services
/// rejoignent la liste du device racine. Un service sans `serviceId` ou sans
/// `controlURL` est ignoré.
pub fn parse_device_description(xml: &[u8]) -> Result<DeviceDescription, DescriptionError> {
    let root = Element::parse(BufReader::new(xml))?;
    let device = root
        .get_child("device")
        .ok_or(DescriptionError::MissingField("device"))?;

    let mut description = DeviceDescription {
        udn: child_text(device, "UDN").unwrap_or_default(),
        friendly_name: child_text(device, "friendlyName"),
        device_type: child_text(device, "deviceType").unwrap_or_default(),
        manufacturer: child_text(device, "manufacturer").unwrap_or_default(),
        model_name: child_text(device, "modelName").unwrap_or_default(),
        url_base: child_text(&root, "URLBase"),
        services: Vec::new(),
    };

    collect_services(device, &mut description.services);
    debug!(
        "Parsed description of {} ({} services)",
        description.udn,
        description.services.len()
    );

    Ok(description)
}

fn collect_services(device: &Element, services: &mut Vec<UpnpService>) {
    if let Some(list) = device.get_child("serviceList") {
        for service in child_elements(list, "service") {
            let (Some(service_id), Some(control_url)) =
                (child_text(service, "serviceId"), child_text(service, "controlURL"))
            else {
                trace!("Skipping service without serviceId or controlURL");
                continue;
            };

            let id = service_id
                .rsplit(':')
                .next()
                .unwrap_or(service_id.as_str())
                .to_string();

            services.push(UpnpService {
                id,
                service_type: child_text(service, "serviceType").unwrap_or_default(),
                control_url,
                scpd_url: child_text(service, "SCPDURL").unwrap_or_default(),
                event_sub_url: child_text(service, "eventSubURL").unwrap_or_default(),
            });
        }
    }

    if let Some(list) = device.get_child("deviceList") {
        for embedded in child_elements(list, "device") {
            collect_services(embedded, services);
        }
    }
}

fn child_elements<'a>(parent: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    parent
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .filter(move |elem| elem.name == name)
}

fn child_text(parent: &Element, name: &str) -> Option<String> {
    parent
        .get_child(name)
        .and_then(|elem| elem.get_text())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Salon</friendlyName>
    <manufacturer>ACME</manufacturer>
    <modelName>Renderer 2000</modelName>
    <UDN>uuid:1234-5678</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:RenderingControl:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:RenderingControl</serviceId>
        <SCPDURL>/rc/scpd.xml</SCPDURL>
        <controlURL>/rc/control</controlURL>
        <eventSubURL>/rc/event</eventSubURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:AVTransport:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:AVTransport</serviceId>
        <SCPDURL>/avt/scpd.xml</SCPDURL>
        <controlURL>/avt/control</controlURL>
        <eventSubURL>/avt/event</eventSubURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:Broken:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:Broken</serviceId>
      </service>
    </serviceList>
    <deviceList>
      <device>
        <deviceType>urn:schemas-upnp-org:device:Embedded:1</deviceType>
        <serviceList>
          <service>
            <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
            <serviceId>urn:upnp-org:serviceId:ConnectionManager</serviceId>
            <SCPDURL>/cm/scpd.xml</SCPDURL>
            <controlURL>/cm/control</controlURL>
            <eventSubURL>/cm/event</eventSubURL>
          </service>
        </serviceList>
      </device>
    </deviceList>
  </device>
</root>"#;

    #[test]
    fn test_parse_description() {
        let desc = parse_device_description(DESCRIPTION.as_bytes()).unwrap();

        assert_eq!(desc.udn, "uuid:1234-5678");
        assert_eq!(desc.friendly_name.as_deref(), Some("Salon"));
        assert_eq!(desc.model_name, "Renderer 2000");
        assert_eq!(desc.services.len(), 3);

        let rc = desc.service("RenderingControl").unwrap();
        assert_eq!(rc.control_url, "/rc/control");
        assert_eq!(rc.scpd_url, "/rc/scpd.xml");
        assert_eq!(rc.event_sub_url, "/rc/event");
        assert_eq!(rc.service_type, "urn:schemas-upnp-org:service:RenderingControl:1");

        assert!(desc.service("AVTransport").is_some());
        assert!(desc.service("ConnectionManager").is_some());
        assert!(desc.service("Broken").is_none());
    }

    #[test]
    fn test_missing_device() {
        let xml = r#"<root xmlns="urn:schemas-upnp-org:device-1-0"></root>"#;
        assert!(matches!(
            parse_device_description(xml.as_bytes()),
            Err(DescriptionError::MissingField("device"))
        ));
    }

    #[test]
    fn test_invalid_xml() {
        assert!(matches!(
            parse_device_description(b"<root><device>"),
            Err(DescriptionError::Xml(_))
        ));
    }
}
