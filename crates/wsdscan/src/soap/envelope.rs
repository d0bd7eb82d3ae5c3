// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Request document builders.
//!
//! Every builder returns a complete, wire-ready SOAP envelope. A fresh
//! message id is minted per document; the caller supplies its own client URN
//! for the `wsa:From` header and the target endpoint for `wsa:To`.

use super::{action, gen_urn, ns};

fn envelope(to: &str, action: &str, from_urn: &str, extra_header: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="{soap}" xmlns:wsa="{wsa}" xmlns:wsd="{wsd}" xmlns:wse="{wse}" xmlns:mex="{mex}" xmlns:wsdp="{wsdp}" xmlns:sca="{sca}" xmlns:pnpx="{pnpx}"><soap:Header><wsa:To>{to}</wsa:To><wsa:Action>{action}</wsa:Action><wsa:MessageID>{msg_id}</wsa:MessageID><wsa:ReplyTo><wsa:Address>{anon}</wsa:Address></wsa:ReplyTo><wsa:From><wsa:Address>{from}</wsa:Address></wsa:From>{extra}</soap:Header><soap:Body>{body}</soap:Body></soap:Envelope>"#,
        soap = ns::SOAP,
        wsa = ns::WSA,
        wsd = ns::WSD,
        wse = ns::WSE,
        mex = ns::MEX,
        wsdp = ns::WSDP,
        sca = ns::SCA,
        pnpx = ns::PNPX,
        to = to,
        action = action,
        msg_id = gen_urn(),
        anon = action::ANONYMOUS,
        from = from_urn,
        extra = extra_header,
        body = body,
    )
}

// ============================================================================
// WS-Discovery
// ============================================================================

/// Probe for targets. `types` is an optional space-separated type filter.
pub fn probe(from_urn: &str, types: &str) -> String {
    let filter = if types.is_empty() {
        "<wsd:Types></wsd:Types>".to_string()
    } else {
        format!("<wsd:Types>{}</wsd:Types>", types)
    };
    envelope(
        action::DISCOVERY_TO,
        action::PROBE,
        from_urn,
        "",
        &format!("<wsd:Probe>{}</wsd:Probe>", filter),
    )
}

/// Resolve one specific endpoint reference to its transport addresses.
pub fn resolve(from_urn: &str, endpoint: &str) -> String {
    envelope(
        action::DISCOVERY_TO,
        action::RESOLVE,
        from_urn,
        "",
        &format!(
            "<wsd:Resolve><wsa:EndpointReference><wsa:Address>{}</wsa:Address></wsa:EndpointReference></wsd:Resolve>",
            endpoint
        ),
    )
}

// ============================================================================
// WS-Transfer
// ============================================================================

/// Metadata `Get` addressed to a target service endpoint.
pub fn transfer_get(from_urn: &str, to: &str) -> String {
    envelope(to, action::TRANSFER_GET, from_urn, "", "")
}

// ============================================================================
// WS-Eventing
// ============================================================================

fn expires_tag(expiration: Option<&str>) -> String {
    match expiration {
        Some(e) => format!("<wse:Expires>{}</wse:Expires>", e),
        None => String::new(),
    }
}

/// Subscribe to a union of event actions in one request.
///
/// `event_uris` are joined into a single action filter, so the device burns
/// only one subscription slot for the whole topic set.
pub fn subscribe(
    from_urn: &str,
    to: &str,
    notify_addr: &str,
    event_uris: &[&str],
    expiration: Option<&str>,
) -> String {
    envelope(
        to,
        action::SUBSCRIBE,
        from_urn,
        "",
        &format!(
            "<wse:Subscribe><wse:Delivery><wse:NotifyTo><wsa:Address>{notify}</wsa:Address></wse:NotifyTo></wse:Delivery>{expires}<wse:Filter Dialect=\"{dialect}\">{filter}</wse:Filter></wse:Subscribe>",
            notify = notify_addr,
            expires = expires_tag(expiration),
            dialect = format_args!("{}/Action", ns::WSDP),
            filter = event_uris.join(" "),
        ),
    )
}

/// Tear down a subscription by id.
pub fn unsubscribe(from_urn: &str, to: &str, subscription_id: &str) -> String {
    envelope(
        to,
        action::UNSUBSCRIBE,
        from_urn,
        &format!("<wse:Identifier>{}</wse:Identifier>", subscription_id),
        "<wse:Unsubscribe></wse:Unsubscribe>",
    )
}

/// Extend a subscription's lifetime.
pub fn renew(from_urn: &str, to: &str, subscription_id: &str, expiration: Option<&str>) -> String {
    envelope(
        to,
        action::RENEW,
        from_urn,
        &format!("<wse:Identifier>{}</wse:Identifier>", subscription_id),
        &format!("<wse:Renew>{}</wse:Renew>", expires_tag(expiration)),
    )
}

/// Query a subscription's remaining lifetime.
pub fn get_status(from_urn: &str, to: &str, subscription_id: &str) -> String {
    envelope(
        to,
        action::GET_STATUS,
        from_urn,
        &format!("<wse:Identifier>{}</wse:Identifier>", subscription_id),
        "<wse:GetStatus></wse:GetStatus>",
    )
}

/// Subscribe as a device-initiated scan destination.
///
/// `display_text` is shown on the device panel; `client_context` is the
/// opaque key echoed back in `ScanAvailableEvent` notifications.
pub fn subscribe_scan_available(
    from_urn: &str,
    to: &str,
    notify_addr: &str,
    display_text: &str,
    client_context: &str,
    expiration: Option<&str>,
) -> String {
    envelope(
        to,
        action::SUBSCRIBE,
        from_urn,
        "",
        &format!(
            "<wse:Subscribe><wse:Delivery><wse:NotifyTo><wsa:Address>{notify}</wsa:Address></wse:NotifyTo></wse:Delivery>{expires}<wse:Filter Dialect=\"{dialect}\">{event}</wse:Filter><sca:ScanDestinations><sca:ScanDestination><sca:ClientDisplayName>{display}</sca:ClientDisplayName><sca:ClientContext>{context}</sca:ClientContext></sca:ScanDestination></sca:ScanDestinations></wse:Subscribe>",
            notify = notify_addr,
            expires = expires_tag(expiration),
            dialect = format_args!("{}/Action", ns::WSDP),
            event = action::scan_event("ScanAvailableEvent"),
            display = display_text,
            context = client_context,
        ),
    )
}

// ============================================================================
// Scan service
// ============================================================================

/// Combined query for description, configuration, status and default ticket.
pub fn get_scanner_elements(from_urn: &str, to: &str) -> String {
    envelope(
        to,
        &action::scan_event("GetScannerElements"),
        from_urn,
        "",
        "<sca:GetScannerElementsRequest><sca:RequestedElements><sca:Name>sca:ScannerDescription</sca:Name><sca:Name>sca:ScannerConfiguration</sca:Name><sca:Name>sca:ScannerStatus</sca:Name><sca:Name>sca:DefaultScanTicket</sca:Name></sca:RequestedElements></sca:GetScannerElementsRequest>",
    )
}

/// Submit a ticket for device-side validation.
pub fn validate_scan_ticket(from_urn: &str, to: &str, ticket_xml: &str) -> String {
    envelope(
        to,
        &action::scan_event("ValidateScanTicket"),
        from_urn,
        "",
        &format!("<sca:ValidateScanTicketRequest>{}</sca:ValidateScanTicketRequest>", ticket_xml),
    )
}

/// Create a scan job. `scan_identifier` and `dest_token` are only populated
/// for device-initiated jobs.
pub fn create_scan_job(
    from_urn: &str,
    to: &str,
    ticket_xml: &str,
    scan_identifier: &str,
    dest_token: &str,
) -> String {
    let device_initiated = if scan_identifier.is_empty() && dest_token.is_empty() {
        String::new()
    } else {
        format!(
            "<sca:ScanIdentifier>{}</sca:ScanIdentifier><sca:DestinationToken>{}</sca:DestinationToken>",
            scan_identifier, dest_token
        )
    };
    envelope(
        to,
        &action::scan_event("CreateScanJob"),
        from_urn,
        "",
        &format!(
            "<sca:CreateScanJobRequest>{}{}</sca:CreateScanJobRequest>",
            device_initiated, ticket_xml
        ),
    )
}

/// Abort a job by id.
pub fn cancel_job(from_urn: &str, to: &str, job_id: u32) -> String {
    envelope(
        to,
        &action::scan_event("CancelJob"),
        from_urn,
        "",
        &format!("<sca:CancelJobRequest><sca:JobId>{}</sca:JobId></sca:CancelJobRequest>", job_id),
    )
}

/// Query status, ticket and document list of one job.
pub fn get_job_elements(from_urn: &str, to: &str, job_id: u32) -> String {
    envelope(
        to,
        &action::scan_event("GetJobElements"),
        from_urn,
        "",
        &format!(
            "<sca:GetJobElementsRequest><sca:JobId>{}</sca:JobId><sca:RequestedElements><sca:Name>sca:JobStatus</sca:Name><sca:Name>sca:ScanTicket</sca:Name><sca:Name>sca:Documents</sca:Name></sca:RequestedElements></sca:GetJobElementsRequest>",
            job_id
        ),
    )
}

/// List currently active jobs.
pub fn get_active_jobs(from_urn: &str, to: &str) -> String {
    envelope(
        to,
        &action::scan_event("GetActiveJobs"),
        from_urn,
        "",
        "<sca:GetActiveJobsRequest></sca:GetActiveJobsRequest>",
    )
}

/// List recently ended jobs. Not every device keeps a history.
pub fn get_job_history(from_urn: &str, to: &str) -> String {
    envelope(
        to,
        &action::scan_event("GetJobHistory"),
        from_urn,
        "",
        "<sca:GetJobHistoryRequest></sca:GetJobHistoryRequest>",
    )
}

/// Pull the next image (or multi-page batch) of a job.
pub fn retrieve_image(
    from_urn: &str,
    to: &str,
    job_id: u32,
    job_token: &str,
    doc_name: &str,
) -> String {
    envelope(
        to,
        &action::scan_event("RetrieveImage"),
        from_urn,
        "",
        &format!(
            "<sca:RetrieveImageRequest><sca:JobId>{}</sca:JobId><sca:JobToken>{}</sca:JobToken><sca:DocumentDescription><sca:DocumentName>{}</sca:DocumentName></sca:DocumentDescription></sca:RetrieveImageRequest>",
            job_id, job_token, doc_name
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap;
    use roxmltree::Document;

    #[test]
    fn test_probe_is_well_formed() {
        let xml = probe("urn:uuid:client", "wsdp:Device");
        let doc = Document::parse(&xml).unwrap();
        assert_eq!(soap::action_of(&doc).as_deref(), Some(action::PROBE));
        assert!(soap::message_id_of(&doc).unwrap().starts_with("urn:uuid:"));
        assert_eq!(
            soap::text(doc.root_element(), ns::WSD, "Types").as_deref(),
            Some("wsdp:Device")
        );
    }

    #[test]
    fn test_subscribe_joins_filters() {
        let uris = [
            "http://schemas.microsoft.com/windows/2006/08/wdp/scan/JobStatusEvent",
            "http://schemas.microsoft.com/windows/2006/08/wdp/scan/JobEndStateEvent",
        ];
        let xml = subscribe(
            "urn:uuid:client",
            "http://10.0.0.9:8018/scan",
            "http://10.0.0.2:6666/wsd",
            &uris,
            Some("P0Y0M2DT0H0M0S"),
        );
        let doc = Document::parse(&xml).unwrap();
        let filter = soap::text(doc.root_element(), ns::WSE, "Filter").unwrap();
        assert!(filter.contains("JobStatusEvent"));
        assert!(filter.contains("JobEndStateEvent"));
        assert_eq!(
            soap::text(doc.root_element(), ns::WSE, "Expires").as_deref(),
            Some("P0Y0M2DT0H0M0S")
        );
    }

    #[test]
    fn test_create_job_omits_empty_destination() {
        let xml = create_scan_job("urn:uuid:client", "http://h/scan", "<sca:ScanTicket></sca:ScanTicket>", "", "");
        assert!(!xml.contains("DestinationToken"));
        let xml = create_scan_job("urn:uuid:client", "http://h/scan", "<sca:ScanTicket></sca:ScanTicket>", "scan-7", "tok");
        let doc = Document::parse(&xml).unwrap();
        assert_eq!(
            soap::text(doc.root_element(), ns::SCA, "DestinationToken").as_deref(),
            Some("tok")
        );
    }
}
