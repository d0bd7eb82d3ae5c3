// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Scanner monitor.
//!
//! Maintains a consumer-side view of one scanner: a baseline snapshot taken
//! at startup, continuously corrected by draining the event queues. Snapshot
//! queues replace their section wholesale; delta queues are folded in one by
//! one (conditions keyed by id, jobs keyed by job id, ended jobs moved to
//! the history list).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::queue::EventQueues;
use crate::error::{Error, Result};
use crate::scan::ops::ScanClient;
use crate::scan::{JobStatus, JobSummary, ScanTicket};
use crate::scan::{ScannerConfiguration, ScannerDescription, ScannerStatus};
use crate::transfer::HostedService;

pub struct ScannerMonitor {
    client: ScanClient,
    service: HostedService,
    queues: Arc<EventQueues>,
    description: ScannerDescription,
    configuration: ScannerConfiguration,
    default_ticket: ScanTicket,
    status: ScannerStatus,
    jobs: HashMap<u32, JobStatus>,
    history: Vec<JobSummary>,
}

impl ScannerMonitor {
    /// Take the baseline snapshot. Devices without a job history answer
    /// `GetJobHistory` with a fault; that reads as an empty history.
    pub async fn start(
        client: ScanClient,
        service: HostedService,
        queues: Arc<EventQueues>,
    ) -> Result<Self> {
        let elements = client.get_scanner_elements(&service).await?;
        let jobs = client
            .get_active_jobs(&service)
            .await?
            .into_iter()
            .map(|summary| (summary.status.id, summary.status))
            .collect();
        let history = match client.get_job_history(&service).await {
            Ok(history) => history,
            Err(Error::Fault(fault)) => {
                debug!(subcode = %fault.subcode, "device keeps no job history");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        info!(scanner = %elements.description.name, "monitor started");
        Ok(Self {
            client,
            service,
            queues,
            description: elements.description,
            configuration: elements.configuration,
            default_ticket: elements.default_ticket,
            status: elements.status,
            jobs,
            history,
        })
    }

    /// Fold everything queued since the last call into the view.
    pub fn refresh(&mut self) {
        if let Some(description) = self.queues.description.drain_latest() {
            self.description = description;
        }
        if let Some(configuration) = self.queues.configuration.drain_latest() {
            self.configuration = configuration;
        }
        if let Some(ticket) = self.queues.default_ticket.drain_latest() {
            self.default_ticket = ticket;
        }
        if let Some(summary) = self.queues.status_summary.drain_latest() {
            self.status.state = summary.state;
            self.status.reasons = summary.reasons;
            if !summary.time.is_empty() {
                self.status.time = summary.time;
            }
        }
        for condition in self.queues.conditions.drain_all() {
            self.status.active_conditions.insert(condition.id, condition);
        }
        for (id, clear_time) in self.queues.conditions_cleared.drain_all() {
            if let Some(condition) = self.status.active_conditions.remove(&id) {
                self.status.conditions_history.push((clear_time, condition));
            }
        }
        for status in self.queues.job_status.drain_all() {
            self.jobs.insert(status.id, status);
        }
        for ended in self.queues.job_ended.drain_all() {
            self.jobs.remove(&ended.status.id);
            self.history.push(ended);
        }
    }

    /// Re-fetch the full snapshot, discarding the accumulated view. Used
    /// after an event gap (lost subscription, listener restart).
    pub async fn resync(&mut self) -> Result<()> {
        let elements = self.client.get_scanner_elements(&self.service).await?;
        self.description = elements.description;
        self.configuration = elements.configuration;
        self.default_ticket = elements.default_ticket;
        self.status = elements.status;
        Ok(())
    }

    pub fn description(&self) -> &ScannerDescription {
        &self.description
    }

    pub fn configuration(&self) -> &ScannerConfiguration {
        &self.configuration
    }

    pub fn default_ticket(&self) -> &ScanTicket {
        &self.default_ticket
    }

    pub fn status(&self) -> &ScannerStatus {
        &self.status
    }

    /// Jobs not yet observed as ended, keyed by job id.
    pub fn active_jobs(&self) -> &HashMap<u32, JobStatus> {
        &self.jobs
    }

    pub fn history(&self) -> &[JobSummary] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{JobState, ScannerCondition};
    use crate::transport::{SoapResponse, Transport};
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoTransport;

    #[async_trait]
    impl Transport for NoTransport {
        async fn post(&self, _: &str, _: &str, _: Duration) -> Result<SoapResponse> {
            panic!("no network expected in this test")
        }
    }

    fn monitor(queues: Arc<EventQueues>) -> ScannerMonitor {
        ScannerMonitor {
            client: ScanClient::new(
                Arc::new(NoTransport),
                "urn:uuid:client".into(),
                Duration::from_secs(1),
            ),
            service: HostedService::default(),
            queues,
            description: ScannerDescription::default(),
            configuration: ScannerConfiguration::default(),
            default_ticket: ScanTicket::default(),
            status: ScannerStatus::default(),
            jobs: HashMap::new(),
            history: Vec::new(),
        }
    }

    fn condition(id: u32, name: &str) -> ScannerCondition {
        ScannerCondition {
            id,
            time: "t1".into(),
            name: name.into(),
            component: "ADF".into(),
            severity: "Warning".into(),
        }
    }

    fn job(id: u32, state: JobState) -> JobStatus {
        JobStatus {
            id,
            state,
            reasons: Vec::new(),
            scans_completed: 0,
            created_time: String::new(),
            completed_time: String::new(),
        }
    }

    #[test]
    fn test_summary_refresh_keeps_newest_value() {
        let queues = Arc::new(EventQueues::new());
        let mut m = monitor(Arc::clone(&queues));
        queues.status_summary.push(ScannerStatus {
            state: "Processing".into(),
            ..Default::default()
        });
        queues.status_summary.push(ScannerStatus {
            state: "Idle".into(),
            ..Default::default()
        });
        m.refresh();
        assert_eq!(m.status().state, "Idle");
    }

    #[test]
    fn test_condition_deltas_accumulate_then_clear_into_history() {
        let queues = Arc::new(EventQueues::new());
        let mut m = monitor(Arc::clone(&queues));
        queues.conditions.push(condition(3, "MediaJam"));
        queues.conditions.push(condition(5, "CoverOpen"));
        m.refresh();
        assert_eq!(m.status().active_conditions.len(), 2);

        queues.conditions_cleared.push((3, "t2".into()));
        m.refresh();
        assert_eq!(m.status().active_conditions.len(), 1);
        assert!(m.status().active_conditions.contains_key(&5));
        assert_eq!(m.status().conditions_history.len(), 1);
        assert_eq!(m.status().conditions_history[0].0, "t2");
        assert_eq!(m.status().conditions_history[0].1.name, "MediaJam");
    }

    #[test]
    fn test_job_end_moves_job_to_history() {
        let queues = Arc::new(EventQueues::new());
        let mut m = monitor(Arc::clone(&queues));
        queues.job_status.push(job(7, JobState::Processing));
        m.refresh();
        assert!(m.active_jobs().contains_key(&7));

        queues.job_ended.push(JobSummary {
            name: "scan-7".into(),
            user_name: "wsdscan".into(),
            status: job(7, JobState::Completed),
        });
        m.refresh();
        assert!(m.active_jobs().is_empty());
        assert_eq!(m.history().len(), 1);
        assert_eq!(m.history()[0].name, "scan-7");
    }
}
