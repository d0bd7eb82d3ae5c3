// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! # WS-Discovery engine
//!
//! | Operation              | Exchange                              |
//! |------------------------|---------------------------------------|
//! | `probe`                | directed Probe -> ProbeMatches        |
//! | `resolve`              | directed Resolve -> ResolveMatches    |
//! | `get_device`           | probe then resolve                    |
//! | `probe_multicast`      | Probe datagram to 239.255.255.250     |
//! | `listen_announcements` | passive Hello/Bye multicast listener  |
//!
//! Every inbound message passes duplicate suppression before its action is
//! inspected; a duplicate-only reply stream reads the same as silence.

pub mod cache;
pub mod multicast;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use roxmltree::{Document, Node};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::config::{WSD_MULTICAST_GROUP, WSD_PORT};
use crate::correlator::MessageCorrelator;
use crate::error::Result;
use crate::soap::{self, action, envelope, ns};
use crate::transport::Transport;

pub use cache::DeviceCache;

/// A discovered device endpoint. The endpoint reference address is the
/// stable identity; transport addresses and types may change across
/// announcements, tracked by `metadata_version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetService {
    pub endpoint: String,
    pub xaddrs: Vec<String>,
    pub types: Vec<String>,
    pub scopes: Vec<String>,
    pub metadata_version: u64,
}

/// A probe result. `ambiguous` is set when the reply carried more than one
/// match (discovery proxies may aggregate); disambiguation is the caller's
/// policy.
#[derive(Debug, Clone)]
pub struct ProbeHit {
    pub target: TargetService,
    pub ambiguous: bool,
}

/// A passive Hello (`is_hello`) or Bye announcement.
#[derive(Debug, Clone)]
pub struct Announcement {
    pub is_hello: bool,
    pub target: TargetService,
}

fn parse_target(node: Node<'_, '_>) -> Option<TargetService> {
    let endpoint = soap::find(node, ns::WSA, "EndpointReference")
        .and_then(|ep| soap::text(ep, ns::WSA, "Address"))?;
    Some(TargetService {
        endpoint,
        xaddrs: soap::tokens(node, ns::WSD, "XAddrs"),
        types: soap::tokens(node, ns::WSD, "Types"),
        scopes: soap::tokens(node, ns::WSD, "Scopes"),
        metadata_version: soap::int(node, ns::WSD, "MetadataVersion").unwrap_or(0),
    })
}

fn parse_probe_matches(doc: &Document<'_>) -> Vec<TargetService> {
    soap::body(doc)
        .map(|body| {
            soap::find_all(body, ns::WSD, "ProbeMatch")
                .into_iter()
                .filter_map(parse_target)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_resolve_match(doc: &Document<'_>) -> Option<TargetService> {
    let body = soap::body(doc)?;
    let m = soap::find(body, ns::WSD, "ResolveMatch")?;
    // a resolve match without transport addresses is useless to callers
    parse_target(m).filter(|t| !t.xaddrs.is_empty())
}

pub struct DiscoveryEngine {
    transport: Arc<dyn Transport>,
    correlator: Mutex<MessageCorrelator>,
    client_urn: String,
    timeout: Duration,
}

impl DiscoveryEngine {
    pub fn new(transport: Arc<dyn Transport>, client_urn: String, timeout: Duration) -> Self {
        Self {
            transport,
            correlator: Mutex::new(MessageCorrelator::new()),
            client_urn,
            timeout,
        }
    }

    /// Commit a message id; false means duplicate or malformed.
    fn accept(&self, doc: &Document<'_>) -> bool {
        let id = soap::message_id_of(doc);
        self.correlator.lock().unwrap().record(id.as_deref())
    }

    /// Directed probe. `None` on timeout, on a duplicate-only reply stream,
    /// or when the reply is not a `ProbeMatches`.
    pub async fn probe(&self, target_address: &str) -> Result<Option<ProbeHit>> {
        let req = envelope::probe(&self.client_urn, "");
        let resp = match self.transport.post(target_address, &req, self.timeout).await {
            Ok(resp) => resp,
            Err(crate::error::Error::Timeout(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let body = resp.body_str().into_owned();
        let doc = Document::parse(&body)?;
        if !self.accept(&doc) {
            debug!(target_address, "duplicate probe reply dropped");
            return Ok(None);
        }
        if soap::action_of(&doc).as_deref() != Some(action::PROBE_MATCHES) {
            return Ok(None);
        }
        let mut matches = parse_probe_matches(&doc);
        if matches.is_empty() {
            return Ok(None);
        }
        let ambiguous = matches.len() > 1;
        let target = matches.remove(0);
        info!(endpoint = %target.endpoint, ambiguous, "probe matched");
        Ok(Some(ProbeHit { target, ambiguous }))
    }

    /// Directed resolve. Returns `(true, resolved)` on a de-duplicated
    /// `ResolveMatches`, `(false, original)` on timeout or a non-matching
    /// reply.
    pub async fn resolve(
        &self,
        target_address: &str,
        target: TargetService,
    ) -> Result<(bool, TargetService)> {
        let req = envelope::resolve(&self.client_urn, &target.endpoint);
        let resp = match self.transport.post(target_address, &req, self.timeout).await {
            Ok(resp) => resp,
            Err(crate::error::Error::Timeout(_)) => return Ok((false, target)),
            Err(e) => return Err(e),
        };
        let body = resp.body_str().into_owned();
        let doc = Document::parse(&body)?;
        if !self.accept(&doc)
            || soap::action_of(&doc).as_deref() != Some(action::RESOLVE_MATCHES)
        {
            return Ok((false, target));
        }
        match parse_resolve_match(&doc) {
            Some(resolved) => {
                info!(endpoint = %resolved.endpoint, "resolved");
                Ok((true, resolved))
            }
            None => {
                debug!(endpoint = %target.endpoint, "unresolved");
                Ok((false, target))
            }
        }
    }

    /// Probe then resolve; only a successfully resolved record is returned.
    pub async fn get_device(&self, target_address: &str) -> Result<Option<TargetService>> {
        let hit = match self.probe(target_address).await? {
            Some(hit) => hit,
            None => return Ok(None),
        };
        let (matched, target) = self.resolve(target_address, hit.target).await?;
        Ok(if matched { Some(target) } else { None })
    }

    /// Broadcast a Probe datagram to the WSD multicast group and collect
    /// de-duplicated matches until `window` elapses.
    pub async fn probe_multicast(&self, window: Duration) -> Result<Vec<TargetService>> {
        let sock = multicast::send_socket().await?;
        let req = envelope::probe(&self.client_urn, "");
        sock.send_to(req.as_bytes(), (WSD_MULTICAST_GROUP, WSD_PORT))
            .await?;

        let mut found = Vec::new();
        let deadline = tokio::time::Instant::now() + window;
        let mut buf = vec![0u8; 4096];
        loop {
            let recv = tokio::time::timeout_at(deadline, sock.recv_from(&mut buf)).await;
            let (len, peer) = match recv {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break, // window closed
            };
            let raw = String::from_utf8_lossy(&buf[..len]).into_owned();
            let doc = match Document::parse(&raw) {
                Ok(doc) => doc,
                Err(_) => continue, // unrelated chatter on the group port
            };
            if !self.accept(&doc)
                || soap::action_of(&doc).as_deref() != Some(action::PROBE_MATCHES)
            {
                continue;
            }
            debug!(%peer, "probe match datagram");
            found.extend(parse_probe_matches(&doc));
        }
        Ok(found)
    }

    /// Block until a non-duplicate Hello or Bye arrives on any of `sockets`.
    ///
    /// Blocks indefinitely; callers cancel by dropping the sockets' owner
    /// task or closing the sockets.
    pub async fn listen_announcements(&self, sockets: &[UdpSocket]) -> Result<Announcement> {
        loop {
            let recvs = sockets
                .iter()
                .map(|s| {
                    Box::pin(async move {
                        let mut buf = vec![0u8; 4096];
                        let (len, _) = s.recv_from(&mut buf).await?;
                        buf.truncate(len);
                        Ok::<_, std::io::Error>(buf)
                    })
                })
                .collect::<Vec<_>>();
            let (datagram, _, _) = futures::future::select_all(recvs).await;
            let raw = String::from_utf8_lossy(&datagram?).into_owned();
            let doc = match Document::parse(&raw) {
                Ok(doc) => doc,
                Err(_) => continue,
            };
            let is_hello = match soap::action_of(&doc).as_deref() {
                Some(action::HELLO) => true,
                Some(action::BYE) => false,
                _ => continue,
            };
            if !self.accept(&doc) {
                continue;
            }
            let target = match soap::body(&doc).and_then(parse_target) {
                Some(t) => t,
                None => continue,
            };
            info!(endpoint = %target.endpoint, is_hello, "announcement");
            return Ok(Announcement { is_hello, target });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::SoapResponse;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    pub(crate) fn probe_matches_xml(message_id: &str, targets: &[(&str, u64)]) -> String {
        let matches: String = targets
            .iter()
            .map(|(ep, ver)| {
                format!(
                    "<wsd:ProbeMatch><wsa:EndpointReference><wsa:Address>{ep}</wsa:Address></wsa:EndpointReference><wsd:Types>wsdp:Device</wsd:Types><wsd:XAddrs>http://10.0.0.9:8018/wsd</wsd:XAddrs><wsd:MetadataVersion>{ver}</wsd:MetadataVersion></wsd:ProbeMatch>"
                )
            })
            .collect();
        format!(
            r#"<soap:Envelope xmlns:soap="{soap}" xmlns:wsa="{wsa}" xmlns:wsd="{wsd}">
<soap:Header><wsa:Action>{act}</wsa:Action><wsa:MessageID>{mid}</wsa:MessageID></soap:Header>
<soap:Body><wsd:ProbeMatches>{matches}</wsd:ProbeMatches></soap:Body></soap:Envelope>"#,
            soap = ns::SOAP,
            wsa = ns::WSA,
            wsd = ns::WSD,
            act = action::PROBE_MATCHES,
            mid = message_id,
            matches = matches,
        )
    }

    fn resolve_matches_xml(message_id: &str, ep: &str) -> String {
        format!(
            r#"<soap:Envelope xmlns:soap="{soap}" xmlns:wsa="{wsa}" xmlns:wsd="{wsd}">
<soap:Header><wsa:Action>{act}</wsa:Action><wsa:MessageID>{mid}</wsa:MessageID></soap:Header>
<soap:Body><wsd:ResolveMatches><wsd:ResolveMatch>
<wsa:EndpointReference><wsa:Address>{ep}</wsa:Address></wsa:EndpointReference>
<wsd:XAddrs>http://10.0.0.9:8018/wsd</wsd:XAddrs>
<wsd:MetadataVersion>2</wsd:MetadataVersion>
</wsd:ResolveMatch></wsd:ResolveMatches></soap:Body></soap:Envelope>"#,
            soap = ns::SOAP,
            wsa = ns::WSA,
            wsd = ns::WSD,
            act = action::RESOLVE_MATCHES,
            mid = message_id,
            ep = ep,
        )
    }

    struct ScriptedTransport {
        replies: StdMutex<Vec<Result<SoapResponse>>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<SoapResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: StdMutex::new(replies),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post(&self, _: &str, _: &str, _: Duration) -> Result<SoapResponse> {
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn xml_resp(body: String) -> Result<SoapResponse> {
        Ok(SoapResponse {
            content_type: "application/soap+xml".into(),
            body: body.into_bytes(),
        })
    }

    fn engine(t: Arc<dyn Transport>) -> DiscoveryEngine {
        DiscoveryEngine::new(t, "urn:uuid:client".into(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_probe_returns_first_and_flags_ambiguity() {
        let t = ScriptedTransport::new(vec![xml_resp(probe_matches_xml(
            "urn:uuid:m1",
            &[("urn:uuid:1234", 1), ("urn:uuid:5678", 1)],
        ))]);
        let hit = engine(t).probe("http://10.0.0.9:8018/wsd").await.unwrap().unwrap();
        assert_eq!(hit.target.endpoint, "urn:uuid:1234");
        assert!(hit.ambiguous);
        assert_eq!(hit.target.xaddrs, vec!["http://10.0.0.9:8018/wsd"]);
    }

    #[tokio::test]
    async fn test_probe_drops_duplicate_reply() {
        let xml = probe_matches_xml("urn:uuid:same", &[("urn:uuid:1234", 1)]);
        let t = ScriptedTransport::new(vec![xml_resp(xml.clone()), xml_resp(xml)]);
        let eng = engine(t);
        assert!(eng.probe("http://h/wsd").await.unwrap().is_some());
        // second reply reuses the message id and must read as silence
        assert!(eng.probe("http://h/wsd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_probe_timeout_is_absent_not_error() {
        let t = ScriptedTransport::new(vec![Err(Error::Timeout("probe".into()))]);
        assert!(engine(t).probe("http://h/wsd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_original_on_timeout() {
        let t = ScriptedTransport::new(vec![Err(Error::Timeout("resolve".into()))]);
        let original = TargetService {
            endpoint: "urn:uuid:1234".into(),
            xaddrs: vec![],
            types: vec![],
            scopes: vec![],
            metadata_version: 1,
        };
        let (matched, back) = engine(t).resolve("http://h/wsd", original.clone()).await.unwrap();
        assert!(!matched);
        assert_eq!(back, original);
    }

    #[tokio::test]
    async fn test_get_device_requires_resolution() {
        let t = ScriptedTransport::new(vec![
            xml_resp(probe_matches_xml("urn:uuid:m1", &[("urn:uuid:1234", 1)])),
            xml_resp(resolve_matches_xml("urn:uuid:m2", "urn:uuid:1234")),
        ]);
        let dev = engine(t).get_device("http://h/wsd").await.unwrap().unwrap();
        assert_eq!(dev.endpoint, "urn:uuid:1234");
        assert_eq!(dev.metadata_version, 2);
    }

    #[tokio::test]
    async fn test_listen_announcements_skips_duplicates_and_noise() {
        let eng = engine(ScriptedTransport::new(vec![]));
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let hello = format!(
            r#"<soap:Envelope xmlns:soap="{soap}" xmlns:wsa="{wsa}" xmlns:wsd="{wsd}">
<soap:Header><wsa:Action>{act}</wsa:Action><wsa:MessageID>urn:uuid:h1</wsa:MessageID></soap:Header>
<soap:Body><wsd:Hello>
<wsa:EndpointReference><wsa:Address>urn:uuid:1234</wsa:Address></wsa:EndpointReference>
<wsd:MetadataVersion>2</wsd:MetadataVersion>
</wsd:Hello></soap:Body></soap:Envelope>"#,
            soap = ns::SOAP,
            wsa = ns::WSA,
            wsd = ns::WSD,
            act = action::HELLO,
        );
        sender.send_to(b"not xml at all", addr).await.unwrap();
        sender.send_to(hello.as_bytes(), addr).await.unwrap();
        // retransmission of the same announcement
        sender.send_to(hello.as_bytes(), addr).await.unwrap();

        let sockets = vec![listener];
        let ann = eng.listen_announcements(&sockets).await.unwrap();
        assert!(ann.is_hello);
        assert_eq!(ann.target.endpoint, "urn:uuid:1234");
        assert_eq!(ann.target.metadata_version, 2);
    }
}
