// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! # SOAP message collaborator
//!
//! The rest of the crate never touches raw XML: request documents come out of
//! [`envelope`] as wire-ready strings, and replies are inspected through the
//! accessors in this module (action URI, message id, fault, namespaced
//! element lookup). Everything is namespace-qualified; matching on local
//! names alone is not enough because the scan schema reuses common names
//! like `Width` and `Name`.

pub mod envelope;

use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};
use std::time::Duration;

use crate::error::SoapFault;

/// XML namespaces of the WS-* protocol family.
pub mod ns {
    /// SOAP 1.2 envelope.
    pub const SOAP: &str = "http://www.w3.org/2003/05/soap-envelope";
    /// WS-Addressing 2004/08.
    pub const WSA: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
    /// WS-Discovery 2005/04.
    pub const WSD: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery";
    /// WS-Eventing 2004/08.
    pub const WSE: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing";
    /// WS-MetadataExchange 2004/09.
    pub const MEX: &str = "http://schemas.xmlsoap.org/ws/2004/09/mex";
    /// Devices Profile for Web Services 2006/02.
    pub const WSDP: &str = "http://schemas.xmlsoap.org/ws/2006/02/devprof";
    /// WSD scan service schema.
    pub const SCA: &str = "http://schemas.microsoft.com/windows/2006/08/wdp/scan";
    /// PnP-X device metadata.
    pub const PNPX: &str = "http://schemas.microsoft.com/windows/pnpx/2005/10";
}

/// WS-Addressing action URIs handled by this client.
pub mod action {
    use super::ns;

    pub const PROBE: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe";
    pub const PROBE_MATCHES: &str =
        "http://schemas.xmlsoap.org/ws/2005/04/discovery/ProbeMatches";
    pub const RESOLVE: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery/Resolve";
    pub const RESOLVE_MATCHES: &str =
        "http://schemas.xmlsoap.org/ws/2005/04/discovery/ResolveMatches";
    pub const HELLO: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery/Hello";
    pub const BYE: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery/Bye";

    pub const TRANSFER_GET: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Get";

    pub const SUBSCRIBE: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing/Subscribe";
    pub const UNSUBSCRIBE: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing/Unsubscribe";
    pub const RENEW: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing/Renew";
    pub const GET_STATUS: &str = "http://schemas.xmlsoap.org/ws/2004/08/eventing/GetStatus";

    pub const FAULT: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/fault";
    pub const ANONYMOUS: &str =
        "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";

    /// The WSD discovery well-known "To" URN for multicast-scoped requests.
    pub const DISCOVERY_TO: &str = "urn:schemas-xmlsoap-org:ws:2005:04:discovery";

    /// Event action URI for a scan-schema event suffix.
    pub fn scan_event(suffix: &str) -> String {
        format!("{}/{}", ns::SCA, suffix)
    }
}

/// Generate a `urn:uuid:` URN usable as client id or message id.
pub fn gen_urn() -> String {
    format!("urn:uuid:{}", uuid::Uuid::new_v4())
}

// ============================================================================
// Response accessors
// ============================================================================

fn matches(node: &Node<'_, '_>, ns_uri: &str, local: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && node.tag_name().namespace() == Some(ns_uri)
}

/// First descendant element with the given namespace and local name.
pub fn find<'a, 'd>(node: Node<'a, 'd>, ns_uri: &str, local: &str) -> Option<Node<'a, 'd>> {
    node.descendants().find(|n| matches(n, ns_uri, local))
}

/// All descendant elements with the given namespace and local name.
pub fn find_all<'a, 'd>(node: Node<'a, 'd>, ns_uri: &str, local: &str) -> Vec<Node<'a, 'd>> {
    node.descendants()
        .filter(|n| matches(n, ns_uri, local))
        .collect()
}

/// Trimmed text content of the first matching descendant.
pub fn text(node: Node<'_, '_>, ns_uri: &str, local: &str) -> Option<String> {
    find(node, ns_uri, local)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Whitespace-separated tokens of the first matching descendant.
pub fn tokens(node: Node<'_, '_>, ns_uri: &str, local: &str) -> Vec<String> {
    find(node, ns_uri, local)
        .and_then(|n| n.text())
        .map(|t| t.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Integer content of the first matching descendant.
pub fn int<T: std::str::FromStr>(node: Node<'_, '_>, ns_uri: &str, local: &str) -> Option<T> {
    text(node, ns_uri, local).and_then(|t| t.parse().ok())
}

/// xsd:boolean content (`true`/`1`) of the first matching descendant.
pub fn boolean(node: Node<'_, '_>, ns_uri: &str, local: &str) -> Option<bool> {
    text(node, ns_uri, local).map(|t| t == "true" || t == "1")
}

/// The SOAP header element of a message.
pub fn header<'a, 'd>(doc: &'a Document<'d>) -> Option<Node<'a, 'd>> {
    find(doc.root_element(), ns::SOAP, "Header")
}

/// The SOAP body element of a message.
pub fn body<'a, 'd>(doc: &'a Document<'d>) -> Option<Node<'a, 'd>> {
    find(doc.root_element(), ns::SOAP, "Body")
}

/// WS-Addressing action URI of a message.
pub fn action_of(doc: &Document<'_>) -> Option<String> {
    text(doc.root_element(), ns::WSA, "Action")
}

/// WS-Addressing message id of a message.
pub fn message_id_of(doc: &Document<'_>) -> Option<String> {
    text(doc.root_element(), ns::WSA, "MessageID")
}

/// Extract a SOAP fault from the message, if it carries one.
///
/// Faults are recognized either by the addressing fault action or by a
/// `soap:Fault` element in the body; some devices omit the action.
pub fn fault_of(doc: &Document<'_>) -> Option<SoapFault> {
    let is_fault_action = action_of(doc).as_deref() == Some(action::FAULT);
    let fault_node = find(doc.root_element(), ns::SOAP, "Fault");
    if !is_fault_action && fault_node.is_none() {
        return None;
    }
    let root = fault_node.unwrap_or_else(|| doc.root_element());
    let code = find(root, ns::SOAP, "Code")
        .and_then(|c| {
            c.children()
                .find(|n| matches(n, ns::SOAP, "Value"))
                .and_then(|n| n.text())
        })
        .unwrap_or_default()
        .trim()
        .to_string();
    let subcode = find(root, ns::SOAP, "Subcode")
        .and_then(|s| text(s, ns::SOAP, "Value"))
        .unwrap_or_default();
    let reason = find(root, ns::SOAP, "Reason")
        .and_then(|r| text(r, ns::SOAP, "Text"))
        .unwrap_or_default();
    Some(SoapFault {
        code,
        subcode,
        reason,
    })
}

// ============================================================================
// xsd:dateTime / xsd:duration
// ============================================================================

/// Format an instant as xsd:dateTime with millisecond precision, UTC.
pub fn fmt_xsd_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Format a duration as xsd:duration (`PnYnMnDTnHnMnS`).
///
/// Years and months use the 365/31-day approximations the protocol peers
/// tolerate for subscription expirations.
pub fn fmt_xsd_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let days = total_secs / 86_400;
    let (years, days) = (days / 365, days % 365);
    let (months, days) = (days / 31, days % 31);
    let rem = total_secs % 86_400;
    let (hours, rem) = (rem / 3600, rem % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    format!(
        "P{}Y{}M{}DT{}H{}M{}S",
        years, months, days, hours, minutes, seconds
    )
}
