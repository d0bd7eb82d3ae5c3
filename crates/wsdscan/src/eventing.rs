// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! # WS-Eventing subscriber
//!
//! | Operation                  | Purpose                                    |
//! |----------------------------|--------------------------------------------|
//! | `subscribe`                | register for a union of event actions      |
//! | `subscribe_all_scanner_events` | the full six-topic scanner union       |
//! | `subscribe_scan_available` | register as a device-initiated destination |
//! | `unsubscribe`              | teardown, idempotent                       |
//! | `renew`                    | extend one subscription's lifetime         |
//! | `get_status`               | query remaining lifetime                   |
//!
//! Renewal automation is deliberately absent; `renew`/`get_status` are
//! single calls for callers that manage their own schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use roxmltree::Document;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::soap::{self, action, envelope, ns};
use crate::transfer::HostedService;
use crate::transport::Transport;

/// Subscription lifetime, resolved to a wire string in exactly one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Device default (often infinite).
    None,
    /// Expire at an absolute instant.
    Absolute(DateTime<Utc>),
    /// Expire after a duration from acceptance.
    Relative(Duration),
}

impl Expiration {
    /// The xsd:dateTime or xsd:duration value for the `wse:Expires` tag, or
    /// `None` when the tag is omitted entirely.
    pub fn to_xsd(self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Absolute(dt) => Some(soap::fmt_xsd_datetime(dt)),
            Self::Relative(d) => Some(soap::fmt_xsd_duration(d)),
        }
    }
}

/// An active registration with a device.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Device-assigned opaque id, quoted back in every lifecycle call.
    pub id: String,
    /// Endpoint of the hosted service the subscription lives on.
    pub service_endpoint: String,
    pub event_uris: Vec<String>,
    pub expiration: Expiration,
}

/// The six scanner event actions covered by one bulk subscription.
pub fn all_scanner_event_uris() -> Vec<String> {
    [
        "ScannerElementsChangeEvent",
        "ScannerStatusSummaryEvent",
        "ScannerStatusConditionEvent",
        "ScannerStatusConditionClearedEvent",
        "JobStatusEvent",
        "JobEndStateEvent",
    ]
    .into_iter()
    .map(action::scan_event)
    .collect()
}

pub struct EventingClient {
    transport: Arc<dyn Transport>,
    client_urn: String,
    timeout: Duration,
}

impl EventingClient {
    pub fn new(transport: Arc<dyn Transport>, client_urn: String, timeout: Duration) -> Self {
        Self {
            transport,
            client_urn,
            timeout,
        }
    }

    async fn exchange(&self, service: &HostedService, req: &str) -> Result<String> {
        let resp = self
            .transport
            .post(&service.endpoint, req, self.timeout)
            .await?;
        Ok(resp.body_str().into_owned())
    }

    /// Subscribe to a union of event actions in a single round-trip.
    ///
    /// A SOAP fault means the device rejected the request (`Error::Fault`);
    /// a timeout is a distinct, retryable condition.
    pub async fn subscribe(
        &self,
        service: &HostedService,
        event_uris: &[String],
        notify_addr: &str,
        expiration: Expiration,
    ) -> Result<Subscription> {
        let uris: Vec<&str> = event_uris.iter().map(String::as_str).collect();
        let req = envelope::subscribe(
            &self.client_urn,
            &service.endpoint,
            notify_addr,
            &uris,
            expiration.to_xsd().as_deref(),
        );
        let body = self.exchange(service, &req).await?;
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            return Err(Error::Fault(fault));
        }
        let id = soap::text(doc.root_element(), ns::WSE, "Identifier").ok_or(
            Error::MalformedResponse("SubscribeResponse without wse:Identifier".into()),
        )?;
        info!(service = %service.endpoint, subscription = %id, topics = event_uris.len(), "subscribed");
        Ok(Subscription {
            id,
            service_endpoint: service.endpoint.clone(),
            event_uris: event_uris.to_vec(),
            expiration,
        })
    }

    /// Subscribe to all six scanner event topics at once, burning a single
    /// device-side subscription slot.
    pub async fn subscribe_all_scanner_events(
        &self,
        service: &HostedService,
        notify_addr: &str,
        expiration: Expiration,
    ) -> Result<Subscription> {
        self.subscribe(service, &all_scanner_event_uris(), notify_addr, expiration)
            .await
    }

    /// Register this client as a device-initiated scan destination.
    ///
    /// Returns the subscription plus the destination token that later job
    /// creation must quote for device-initiated jobs.
    pub async fn subscribe_scan_available(
        &self,
        service: &HostedService,
        display_text: &str,
        client_context: &str,
        notify_addr: &str,
        expiration: Expiration,
    ) -> Result<(Subscription, String)> {
        let req = envelope::subscribe_scan_available(
            &self.client_urn,
            &service.endpoint,
            notify_addr,
            display_text,
            client_context,
            expiration.to_xsd().as_deref(),
        );
        let body = self.exchange(service, &req).await?;
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            return Err(Error::Fault(fault));
        }
        let id = soap::text(doc.root_element(), ns::WSE, "Identifier").ok_or(
            Error::MalformedResponse("SubscribeResponse without wse:Identifier".into()),
        )?;
        let token = soap::text(doc.root_element(), ns::SCA, "DestinationToken").ok_or(
            Error::MalformedResponse("SubscribeResponse without sca:DestinationToken".into()),
        )?;
        info!(service = %service.endpoint, subscription = %id, client_context, "scan destination registered");
        let subscription = Subscription {
            id,
            service_endpoint: service.endpoint.clone(),
            event_uris: vec![action::scan_event("ScanAvailableEvent")],
            expiration,
        };
        Ok((subscription, token))
    }

    /// Tear down a subscription. A device fault reads as "already gone" and
    /// yields `false` rather than an error.
    pub async fn unsubscribe(&self, service: &HostedService, subscription_id: &str) -> Result<bool> {
        let req = envelope::unsubscribe(&self.client_urn, &service.endpoint, subscription_id);
        let body = self.exchange(service, &req).await?;
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            warn!(subscription = subscription_id, fault = %fault.subcode, "unsubscribe faulted");
            return Ok(false);
        }
        info!(subscription = subscription_id, "unsubscribed");
        Ok(true)
    }

    /// Extend a subscription's lifetime. `false` on a device fault.
    pub async fn renew(
        &self,
        service: &HostedService,
        subscription_id: &str,
        expiration: Expiration,
    ) -> Result<bool> {
        let req = envelope::renew(
            &self.client_urn,
            &service.endpoint,
            subscription_id,
            expiration.to_xsd().as_deref(),
        );
        let body = self.exchange(service, &req).await?;
        let doc = Document::parse(&body)?;
        Ok(soap::fault_of(&doc).is_none())
    }

    /// Query the remaining lifetime. `None` means the subscription has no
    /// expiration set; the value is the raw xsd expires string.
    pub async fn get_status(
        &self,
        service: &HostedService,
        subscription_id: &str,
    ) -> Result<Option<String>> {
        let req = envelope::get_status(&self.client_urn, &service.endpoint, subscription_id);
        let body = self.exchange(service, &req).await?;
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            return Err(Error::Fault(fault));
        }
        Ok(soap::text(doc.root_element(), ns::WSE, "Expires"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SoapFault;
    use crate::transport::SoapResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn subscribe_response(id: &str, dest_token: Option<&str>) -> String {
        let token = dest_token
            .map(|t| {
                format!(
                    "<sca:DestinationResponse><sca:DestinationToken>{}</sca:DestinationToken></sca:DestinationResponse>",
                    t
                )
            })
            .unwrap_or_default();
        format!(
            r#"<soap:Envelope xmlns:soap="{soap}" xmlns:wsa="{wsa}" xmlns:wse="{wse}" xmlns:sca="{sca}">
<soap:Header><wsa:Action>http://schemas.xmlsoap.org/ws/2004/08/eventing/SubscribeResponse</wsa:Action>
<wsa:MessageID>urn:uuid:sub-1</wsa:MessageID></soap:Header>
<soap:Body><wse:SubscribeResponse>
<wse:SubscriptionManager><wse:Identifier>{id}</wse:Identifier></wse:SubscriptionManager>
<wse:Expires>P0Y0M2DT0H0M0S</wse:Expires>{token}
</wse:SubscribeResponse></soap:Body></soap:Envelope>"#,
            soap = ns::SOAP,
            wsa = ns::WSA,
            wse = ns::WSE,
            sca = ns::SCA,
            id = id,
            token = token,
        )
    }

    fn fault_response() -> String {
        format!(
            r#"<soap:Envelope xmlns:soap="{soap}" xmlns:wsa="{wsa}">
<soap:Header><wsa:Action>{fault}</wsa:Action><wsa:MessageID>urn:uuid:f1</wsa:MessageID></soap:Header>
<soap:Body><soap:Fault><soap:Code><soap:Value>soap:Receiver</soap:Value>
<soap:Subcode><soap:Value>wse:EventSourceUnableToProcess</soap:Value></soap:Subcode></soap:Code>
<soap:Reason><soap:Text>busy</soap:Text></soap:Reason></soap:Fault></soap:Body></soap:Envelope>"#,
            soap = ns::SOAP,
            wsa = ns::WSA,
            fault = action::FAULT,
        )
    }

    struct Scripted {
        replies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn post(&self, _: &str, _: &str, _: Duration) -> Result<SoapResponse> {
            Ok(SoapResponse {
                content_type: "application/soap+xml".into(),
                body: self.replies.lock().unwrap().remove(0).into_bytes(),
            })
        }
    }

    fn client(replies: Vec<String>) -> EventingClient {
        EventingClient::new(
            Arc::new(Scripted {
                replies: Mutex::new(replies),
            }),
            "urn:uuid:client".into(),
            Duration::from_secs(1),
        )
    }

    fn scan_service() -> HostedService {
        HostedService {
            endpoint: "http://10.0.0.9:8018/scan".into(),
            types: vec!["sca:ScannerServiceType".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_expiration_to_xsd() {
        assert_eq!(Expiration::None.to_xsd(), None);
        assert_eq!(
            Expiration::Relative(Duration::from_secs(2 * 86_400)).to_xsd(),
            Some("P0Y0M2DT0H0M0S".to_string())
        );
        use chrono::TimeZone;
        let dt = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            Expiration::Absolute(dt).to_xsd(),
            Some("2026-01-02T03:04:05.000Z".to_string())
        );
    }

    #[tokio::test]
    async fn test_subscribe_returns_identifier() {
        let c = client(vec![subscribe_response("urn:uuid:sub-77", None)]);
        let sub = c
            .subscribe_all_scanner_events(&scan_service(), "http://10.0.0.2:6666/wsd", Expiration::None)
            .await
            .unwrap();
        assert_eq!(sub.id, "urn:uuid:sub-77");
        assert_eq!(sub.event_uris.len(), 6);
    }

    #[tokio::test]
    async fn test_subscribe_fault_is_rejection() {
        let c = client(vec![fault_response()]);
        let err = c
            .subscribe_all_scanner_events(&scan_service(), "http://10.0.0.2:6666/wsd", Expiration::None)
            .await
            .unwrap_err();
        match err {
            Error::Fault(SoapFault { subcode, .. }) => {
                assert!(subcode.ends_with("EventSourceUnableToProcess"))
            }
            other => panic!("expected fault, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_scan_available_subscription_carries_token() {
        let c = client(vec![subscribe_response("urn:uuid:sub-9", Some("TOK-42"))]);
        let (sub, token) = c
            .subscribe_scan_available(
                &scan_service(),
                "Desk scans",
                "ctx-1",
                "http://10.0.0.2:6666/wsd",
                Expiration::Relative(Duration::from_secs(86_400)),
            )
            .await
            .unwrap();
        assert_eq!(sub.id, "urn:uuid:sub-9");
        assert_eq!(token, "TOK-42");
    }

    #[tokio::test]
    async fn test_unsubscribe_fault_reads_as_already_gone() {
        let c = client(vec![fault_response()]);
        assert!(!c.unsubscribe(&scan_service(), "urn:uuid:sub-9").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_status_none_means_no_expiry() {
        let xml = format!(
            r#"<soap:Envelope xmlns:soap="{soap}" xmlns:wsa="{wsa}" xmlns:wse="{wse}">
<soap:Header><wsa:Action>urn:ok</wsa:Action></soap:Header>
<soap:Body><wse:GetStatusResponse></wse:GetStatusResponse></soap:Body></soap:Envelope>"#,
            soap = ns::SOAP,
            wsa = ns::WSA,
            wse = ns::WSE,
        );
        let c = client(vec![xml]);
        assert!(c.get_status(&scan_service(), "urn:uuid:sub-9").await.unwrap().is_none());
    }
}
