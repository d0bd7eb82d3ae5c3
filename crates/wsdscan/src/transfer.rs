// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! WS-Transfer metadata resolver.
//!
//! One `Get` round-trip turns a discovered [`TargetService`] into device
//! model/identity info plus the list of hosted capability endpoints. The
//! three metadata sections (ThisModel, ThisDevice, Relationship) are
//! mandatory; a device omitting one yields [`Error::MissingMetadata`] so a
//! non-compliant device never aborts a multi-device sweep.

use std::sync::Arc;
use std::time::Duration;

use roxmltree::{Document, Node};
use tracing::info;

use crate::discovery::TargetService;
use crate::error::{Error, Result};
use crate::soap::{self, envelope, ns};
use crate::transport::{submit_request, Transport};

/// Device model and identity as reported by ThisModel/ThisDevice.
#[derive(Debug, Clone, Default)]
pub struct TargetInfo {
    pub manufacturer: String,
    pub manufacturer_url: String,
    pub model_name: String,
    pub model_number: String,
    pub model_url: String,
    pub presentation_url: String,
    pub device_categories: Vec<String>,
    pub friendly_name: String,
    pub firmware_version: String,
    pub serial_number: String,
}

/// One capability endpoint hosted by a device. Immutable once parsed.
#[derive(Debug, Clone, Default)]
pub struct HostedService {
    pub endpoint: String,
    pub service_id: String,
    pub types: Vec<String>,
    pub hardware_id: String,
    pub compatible_id: String,
    pub service_address: String,
}

impl HostedService {
    /// True when this endpoint speaks the WSD scan service schema.
    pub fn is_scanner(&self) -> bool {
        self.types.iter().any(|t| t.ends_with("ScannerServiceType"))
    }
}

fn section<'a, 'd>(meta: Node<'a, 'd>, dialect_suffix: &str) -> Option<Node<'a, 'd>> {
    soap::find_all(meta, ns::MEX, "MetadataSection")
        .into_iter()
        .find(|s| {
            s.attribute("Dialect")
                .map(|d| d.ends_with(dialect_suffix))
                .unwrap_or(false)
        })
}

fn parse_model(section: Node<'_, '_>, info: &mut TargetInfo) {
    info.manufacturer = soap::text(section, ns::WSDP, "Manufacturer").unwrap_or_default();
    info.manufacturer_url = soap::text(section, ns::WSDP, "ManufacturerUrl").unwrap_or_default();
    info.model_name = soap::text(section, ns::WSDP, "ModelName").unwrap_or_default();
    info.model_number = soap::text(section, ns::WSDP, "ModelNumber").unwrap_or_default();
    info.model_url = soap::text(section, ns::WSDP, "ModelUrl").unwrap_or_default();
    info.presentation_url = soap::text(section, ns::WSDP, "PresentationUrl").unwrap_or_default();
    info.device_categories = soap::tokens(section, ns::PNPX, "DeviceCategory");
}

fn parse_device(section: Node<'_, '_>, info: &mut TargetInfo) {
    info.friendly_name = soap::text(section, ns::WSDP, "FriendlyName").unwrap_or_default();
    info.firmware_version = soap::text(section, ns::WSDP, "FirmwareVersion").unwrap_or_default();
    info.serial_number = soap::text(section, ns::WSDP, "SerialNumber").unwrap_or_default();
}

fn parse_hosted(node: Node<'_, '_>) -> Option<HostedService> {
    let endpoint = soap::find(node, ns::WSA, "EndpointReference")
        .and_then(|ep| soap::text(ep, ns::WSA, "Address"))?;
    Some(HostedService {
        endpoint,
        service_id: soap::text(node, ns::WSDP, "ServiceId").unwrap_or_default(),
        types: soap::tokens(node, ns::WSDP, "Types"),
        hardware_id: soap::text(node, ns::PNPX, "HardwareId").unwrap_or_default(),
        compatible_id: soap::text(node, ns::PNPX, "CompatibleId").unwrap_or_default(),
        service_address: soap::text(node, ns::WSDP, "ServiceAddress").unwrap_or_default(),
    })
}

pub struct TransferResolver {
    transport: Arc<dyn Transport>,
    client_urn: String,
    timeout: Duration,
}

impl TransferResolver {
    pub fn new(transport: Arc<dyn Transport>, client_urn: String, timeout: Duration) -> Self {
        Self {
            transport,
            client_urn,
            timeout,
        }
    }

    /// Fetch and parse the target's metadata over its transport addresses,
    /// trying each in order until one answers.
    pub async fn get(&self, target: &TargetService) -> Result<(TargetInfo, Vec<HostedService>)> {
        let req = envelope::transfer_get(&self.client_urn, &target.endpoint);
        let resp = submit_request(self.transport.as_ref(), &target.xaddrs, &req, self.timeout).await?;
        let body = resp.body_str().into_owned();
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            return Err(Error::Fault(fault));
        }

        let meta = soap::find(doc.root_element(), ns::MEX, "Metadata")
            .ok_or(Error::MissingMetadata("mex:Metadata"))?;
        let model = section(meta, "/ThisModel").ok_or(Error::MissingMetadata("ThisModel"))?;
        let device = section(meta, "/ThisDevice").ok_or(Error::MissingMetadata("ThisDevice"))?;
        let relationship =
            section(meta, "/Relationship").ok_or(Error::MissingMetadata("Relationship"))?;

        let mut info = TargetInfo::default();
        parse_model(model, &mut info);
        parse_device(device, &mut info);

        let services: Vec<HostedService> = soap::find_all(relationship, ns::WSDP, "Hosted")
            .into_iter()
            .filter_map(parse_hosted)
            .collect();
        info!(
            endpoint = %target.endpoint,
            model = %info.model_name,
            services = services.len(),
            "metadata resolved"
        );
        Ok((info, services))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SoapResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    pub(crate) fn metadata_xml() -> String {
        format!(
            r#"<soap:Envelope xmlns:soap="{soap}" xmlns:wsa="{wsa}" xmlns:mex="{mex}" xmlns:wsdp="{wsdp}" xmlns:pnpx="{pnpx}">
<soap:Header><wsa:Action>http://schemas.xmlsoap.org/ws/2004/09/transfer/GetResponse</wsa:Action>
<wsa:MessageID>urn:uuid:meta-1</wsa:MessageID></soap:Header>
<soap:Body><mex:Metadata>
<mex:MetadataSection Dialect="{wsdp}/ThisModel">
  <wsdp:ThisModel>
    <wsdp:Manufacturer>Acme</wsdp:Manufacturer>
    <wsdp:ModelName>ScanJet 9</wsdp:ModelName>
    <pnpx:DeviceCategory>Scanners MFP</pnpx:DeviceCategory>
  </wsdp:ThisModel>
</mex:MetadataSection>
<mex:MetadataSection Dialect="{wsdp}/ThisDevice">
  <wsdp:ThisDevice>
    <wsdp:FriendlyName>Office scanner</wsdp:FriendlyName>
    <wsdp:FirmwareVersion>2.1</wsdp:FirmwareVersion>
    <wsdp:SerialNumber>SN-77</wsdp:SerialNumber>
  </wsdp:ThisDevice>
</mex:MetadataSection>
<mex:MetadataSection Dialect="{wsdp}/Relationship">
  <wsdp:Relationship Type="{wsdp}/host">
    <wsdp:Hosted>
      <wsa:EndpointReference><wsa:Address>http://10.0.0.9:8018/scan</wsa:Address></wsa:EndpointReference>
      <wsdp:Types>sca:ScannerServiceType</wsdp:Types>
      <wsdp:ServiceId>uri:scan</wsdp:ServiceId>
    </wsdp:Hosted>
    <wsdp:Hosted>
      <wsa:EndpointReference><wsa:Address>http://10.0.0.9:8018/print</wsa:Address></wsa:EndpointReference>
      <wsdp:Types>prt:PrinterServiceType</wsdp:Types>
      <wsdp:ServiceId>uri:print</wsdp:ServiceId>
    </wsdp:Hosted>
  </wsdp:Relationship>
</mex:MetadataSection>
</mex:Metadata></soap:Body></soap:Envelope>"#,
            soap = ns::SOAP,
            wsa = ns::WSA,
            mex = ns::MEX,
            wsdp = ns::WSDP,
            pnpx = ns::PNPX,
        )
    }

    struct OneShot {
        reply: Mutex<Option<String>>,
    }

    #[async_trait]
    impl Transport for OneShot {
        async fn post(&self, _: &str, _: &str, _: Duration) -> Result<SoapResponse> {
            Ok(SoapResponse {
                content_type: "application/soap+xml".into(),
                body: self.reply.lock().unwrap().take().unwrap().into_bytes(),
            })
        }
    }

    fn target() -> TargetService {
        TargetService {
            endpoint: "urn:uuid:1234".into(),
            xaddrs: vec!["http://10.0.0.9:8018/wsd".into()],
            types: vec![],
            scopes: vec![],
            metadata_version: 1,
        }
    }

    fn resolver(reply: String) -> TransferResolver {
        TransferResolver::new(
            Arc::new(OneShot {
                reply: Mutex::new(Some(reply)),
            }),
            "urn:uuid:client".into(),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_get_parses_all_sections() {
        let (info, services) = resolver(metadata_xml()).get(&target()).await.unwrap();
        assert_eq!(info.manufacturer, "Acme");
        assert_eq!(info.friendly_name, "Office scanner");
        assert_eq!(info.device_categories, vec!["Scanners", "MFP"]);
        assert_eq!(services.len(), 2);
        let scanner = services.iter().find(|s| s.is_scanner()).unwrap();
        assert_eq!(scanner.endpoint, "http://10.0.0.9:8018/scan");
        assert_eq!(services.iter().filter(|s| s.is_scanner()).count(), 1);
    }

    #[tokio::test]
    async fn test_missing_section_is_an_error_not_a_panic() {
        let xml = metadata_xml().replace("ThisDevice", "SomethingElse");
        let err = resolver(xml).get(&target()).await.unwrap_err();
        assert!(matches!(err, Error::MissingMetadata("ThisDevice")));
    }
}
