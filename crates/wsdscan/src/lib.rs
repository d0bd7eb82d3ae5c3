// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! # wsdscan - WSD scan service client
//!
//! A pure Rust client for network scanners speaking the Web Services on
//! Devices stack: WS-Discovery for finding devices, WS-Transfer for reading
//! their metadata, WS-Eventing for notifications and the WSD scan schema
//! for driving acquisitions end to end.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wsdscan::discovery::DiscoveryEngine;
//! use wsdscan::soap;
//! use wsdscan::transport::HttpTransport;
//!
//! #[tokio::main]
//! async fn main() -> wsdscan::Result<()> {
//!     let transport = Arc::new(HttpTransport::new()?);
//!     let engine = DiscoveryEngine::new(transport, soap::gen_urn(), Duration::from_secs(3));
//!     if let Some(hit) = engine.probe("http://10.0.0.9:3702/").await? {
//!         println!("found {}", hit.target.endpoint);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                     Orchestration Layer                      |
//! |  ScanOrchestrator | ScannerMonitor | device-initiated worker |
//! +--------------------------------------------------------------+
//! |                       Protocol Layer                         |
//! |  discovery (WS-Discovery) | transfer (WS-Transfer Get)       |
//! |  eventing (WS-Eventing)   | scan (WSD scan schema)           |
//! +--------------------------------------------------------------+
//! |                      Messaging Layer                         |
//! |  soap (envelopes, accessors) | events (listener, queues)     |
//! +--------------------------------------------------------------+
//! |                      Transport Layer                         |
//! |  HTTP unicast (reqwest) | UDP multicast 239.255.255.250:3702 |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`discovery::DiscoveryEngine`] | Probe/Resolve/Hello/Bye handling with duplicate suppression |
//! | [`transfer::TransferResolver`] | Device metadata retrieval (model, hosted services) |
//! | [`eventing::EventingClient`] | Subscription lifecycle against a hosted service |
//! | [`scan::ops::ScanClient`] | The scan schema operations (tickets, jobs, images) |
//! | [`scan::orchestrator::ScanOrchestrator`] | Full acquisition runs, profile-driven |
//! | [`events::EventServer`] | Local listener the device POSTs notifications to |
//! | [`events::ScannerMonitor`] | Baseline snapshot + event-folded device view |

/// Client configuration and YAML scan profiles.
pub mod config;
/// Multicast message-id dedup ring.
pub mod correlator;
/// WS-Discovery engine (probe, resolve, announcement listener, device cache).
pub mod discovery;
/// Error taxonomy shared by every operation.
pub mod error;
/// WS-Eventing subscriber (subscribe, renew, unsubscribe, status).
pub mod eventing;
/// Notification listener, event queues, context registry, monitor.
pub mod events;
/// Scan schema: tickets, jobs, parsers, image extraction, orchestration.
pub mod scan;
/// SOAP namespaces, envelope builders and response accessors.
pub mod soap;
/// WS-Transfer Get metadata retrieval.
pub mod transfer;
/// HTTP transport abstraction with retry/backoff.
pub mod transport;

pub use error::{Error, Result, SoapFault};
