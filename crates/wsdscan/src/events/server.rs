// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Notification listener.
//!
//! Devices POST event envelopes to the notify address we handed out at
//! subscription time. The path is device-chosen, so a single fallback route
//! accepts everything. Every request is answered `202 Accepted` with an
//! empty body and `Connection: close` no matter what it contained; devices
//! retry or drop subscriptions when they see anything else.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use roxmltree::Document;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::queue::EventQueues;
use super::registry::ContextRegistry;
use crate::error::Result;
use crate::scan::orchestrator::{device_initiated_scan_worker, ScanOrchestrator};
use crate::scan::parsers;
use crate::soap::{self, ns};

#[derive(Clone)]
pub struct EventServerState {
    pub queues: Arc<EventQueues>,
    pub registry: Arc<ContextRegistry>,
    pub orchestrator: Arc<ScanOrchestrator>,
}

pub struct EventServer {
    state: EventServerState,
}

impl EventServer {
    pub fn new(
        queues: Arc<EventQueues>,
        registry: Arc<ContextRegistry>,
        orchestrator: Arc<ScanOrchestrator>,
    ) -> Self {
        Self {
            state: EventServerState {
                queues,
                registry,
                orchestrator,
            },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .fallback(post(handle_notification))
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` is notified, then stop accepting and drain
    /// in-flight handlers. Unsubscribing is the owner's responsibility.
    pub async fn serve(&self, listener: TcpListener, shutdown: Arc<Notify>) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "event listener started");
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.notified().await })
            .await?;
        info!("event listener stopped");
        Ok(())
    }
}

async fn handle_notification(
    State(state): State<EventServerState>,
    body: String,
) -> impl IntoResponse {
    dispatch(&state, &body);
    (StatusCode::ACCEPTED, [(header::CONNECTION, "close")])
}

fn dispatch(state: &EventServerState, body: &str) {
    let doc = match Document::parse(body) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "unparsable notification dropped");
            return;
        }
    };
    let Some(action) = soap::action_of(&doc) else {
        warn!("notification without wsa:Action dropped");
        return;
    };
    let Some(suffix) = action
        .strip_prefix(ns::SCA)
        .and_then(|s| s.strip_prefix('/'))
    else {
        debug!(%action, "non-scan notification ignored");
        return;
    };
    let root = doc.root_element();
    debug!(event = suffix, "notification received");
    match suffix {
        "ScannerElementsChangeEvent" => {
            if let Some(n) = soap::find(root, ns::SCA, "ScannerDescription") {
                state.queues.description.push(parsers::parse_scanner_description(n));
            }
            if let Some(n) = soap::find(root, ns::SCA, "ScannerConfiguration") {
                state
                    .queues
                    .configuration
                    .push(parsers::parse_scanner_configuration(n));
            }
            if let Some(ticket) =
                soap::find(root, ns::SCA, "DefaultScanTicket").and_then(parsers::parse_scan_ticket)
            {
                state.queues.default_ticket.push(ticket);
            }
        }
        "ScannerStatusSummaryEvent" => {
            if let Some(n) = soap::find(root, ns::SCA, "StatusSummary") {
                state.queues.status_summary.push(parsers::parse_scanner_status(n));
            }
        }
        "ScannerStatusConditionEvent" => {
            if let Some(cond) =
                soap::find(root, ns::SCA, "DeviceCondition").and_then(parsers::parse_scanner_condition)
            {
                state.queues.conditions.push(cond);
            }
        }
        "ScannerStatusConditionClearedEvent" => {
            if let Some(cleared) = soap::find(root, ns::SCA, "DeviceConditionCleared") {
                if let Some(id) = soap::int(cleared, ns::SCA, "ConditionId") {
                    let time = soap::text(cleared, ns::SCA, "ConditionClearTime").unwrap_or_default();
                    state.queues.conditions_cleared.push((id, time));
                }
            }
        }
        "JobStatusEvent" => {
            if let Some(status) =
                soap::find(root, ns::SCA, "JobStatus").and_then(parsers::parse_job_status)
            {
                state.queues.job_status.push(status);
            }
        }
        "JobEndStateEvent" => {
            if let Some(summary) =
                soap::find(root, ns::SCA, "JobEndState").and_then(parsers::parse_job_summary)
            {
                state.queues.job_ended.push(summary);
            }
        }
        "ScanAvailableEvent" => {
            let context = soap::text(root, ns::SCA, "ClientContext");
            let identifier = soap::text(root, ns::SCA, "ScanIdentifier").unwrap_or_default();
            match context {
                Some(context) => {
                    tokio::spawn(device_initiated_scan_worker(
                        Arc::clone(&state.orchestrator),
                        Arc::clone(&state.registry),
                        context,
                        identifier,
                    ));
                }
                None => warn!("ScanAvailableEvent without ClientContext dropped"),
            }
        }
        other => debug!(event = other, "unhandled scan notification ignored"),
    }
}
