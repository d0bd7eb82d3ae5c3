// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! # Scan service operations
//!
//! | Operation              | Notes                                         |
//! |------------------------|-----------------------------------------------|
//! | `get_scanner_elements` | combined baseline snapshot                    |
//! | `validate_ticket`      | at most two round-trips, corrections applied once |
//! | `create_job`           | client- or device-initiated                   |
//! | `cancel_job`           | unknown job id reads as `false`, not an error |
//! | `get_job_elements`     | status + ticket + document list of one job    |
//! | `get_active_jobs`      | summaries of running jobs                     |
//! | `get_job_history`      | summaries of ended jobs (not on all devices)  |
//! | `retrieve_image`       | multipart extraction, one image per frame     |

use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use roxmltree::Document;
use tracing::{debug, info, warn};

use super::{images, parsers, JobStatus, JobSummary, ScanJob, ScanTicket};
use super::{ScannerConfiguration, ScannerDescription, ScannerStatus};
use crate::error::{Error, Result};
use crate::soap::{self, envelope, ns};
use crate::transfer::HostedService;
use crate::transport::Transport;

/// The combined GetScannerElements snapshot.
#[derive(Debug, Clone)]
pub struct ScannerElements {
    pub description: ScannerDescription,
    pub configuration: ScannerConfiguration,
    pub status: ScannerStatus,
    pub default_ticket: ScanTicket,
}

/// Status, submitted ticket and document list of one job.
#[derive(Debug, Clone)]
pub struct JobElements {
    pub status: JobStatus,
    pub ticket: ScanTicket,
    pub documents: Vec<String>,
}

pub struct ScanClient {
    transport: Arc<dyn Transport>,
    client_urn: String,
    timeout: Duration,
}

impl ScanClient {
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

    /// Fetch description, configuration, status and the default ticket in a
    /// single query.
    pub async fn get_scanner_elements(&self, service: &HostedService) -> Result<ScannerElements> {
        let req = envelope::get_scanner_elements(&self.client_urn, &service.endpoint);
        let body = self.exchange(service, &req).await?;
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            return Err(Error::Fault(fault));
        }
        let root = doc.root_element();
        let description = soap::find(root, ns::SCA, "ScannerDescription")
            .map(parsers::parse_scanner_description)
            .ok_or_else(|| Error::MalformedResponse("no ScannerDescription element".into()))?;
        let configuration = soap::find(root, ns::SCA, "ScannerConfiguration")
            .map(parsers::parse_scanner_configuration)
            .ok_or_else(|| Error::MalformedResponse("no ScannerConfiguration element".into()))?;
        let status = soap::find(root, ns::SCA, "ScannerStatus")
            .map(parsers::parse_scanner_status)
            .ok_or_else(|| Error::MalformedResponse("no ScannerStatus element".into()))?;
        let default_ticket = soap::find(root, ns::SCA, "DefaultScanTicket")
            .and_then(parsers::parse_scan_ticket)
            .ok_or_else(|| Error::MalformedResponse("no DefaultScanTicket element".into()))?;
        Ok(ScannerElements {
            description,
            configuration,
            status,
            default_ticket,
        })
    }

    async fn validate_once(
        &self,
        service: &HostedService,
        ticket: &ScanTicket,
    ) -> Result<(bool, Option<super::DocumentParams>)> {
        let req = envelope::validate_scan_ticket(&self.client_urn, &service.endpoint, &ticket.to_xml());
        let body = self.exchange(service, &req).await?;
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            return Err(Error::Fault(fault));
        }
        let valid = soap::boolean(doc.root_element(), ns::SCA, "ValidTicket")
            .ok_or_else(|| Error::MalformedResponse("no ValidTicket element".into()))?;
        let corrected = if valid {
            None
        } else {
            soap::find(doc.root_element(), ns::SCA, "DocumentParameters")
                .map(parsers::parse_document_params)
        };
        Ok((valid, corrected))
    }

    /// Submit a ticket for validation. On rejection the device's corrected
    /// parameters are applied and the ticket is re-submitted exactly once;
    /// the second verdict is final either way.
    pub async fn validate_ticket(
        &self,
        service: &HostedService,
        mut ticket: ScanTicket,
    ) -> Result<(bool, ScanTicket)> {
        let (valid, corrected) = self.validate_once(service, &ticket).await?;
        if valid {
            return Ok((true, ticket));
        }
        match corrected {
            Some(params) => {
                debug!("applying device-corrected document parameters");
                ticket.params = params;
            }
            None => return Ok((false, ticket)),
        }
        let (valid, _) = self.validate_once(service, &ticket).await?;
        Ok((valid, ticket))
    }

    /// Create a scan job and start acquisition. `scan_identifier` and
    /// `dest_token` are empty for client-initiated jobs.
    pub async fn create_job(
        &self,
        service: &HostedService,
        ticket: &ScanTicket,
        scan_identifier: &str,
        dest_token: &str,
    ) -> Result<ScanJob> {
        let req = envelope::create_scan_job(
            &self.client_urn,
            &service.endpoint,
            &ticket.to_xml(),
            scan_identifier,
            dest_token,
        );
        let body = self.exchange(service, &req).await?;
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            return Err(Error::Fault(fault));
        }
        let job = soap::find(doc.root_element(), ns::SCA, "CreateScanJobResponse")
            .and_then(parsers::parse_scan_job)
            .ok_or_else(|| Error::MalformedResponse("unparsable CreateScanJobResponse".into()))?;
        info!(job_id = job.id, "scan job created");
        Ok(job)
    }

    /// Abort a job. An unknown job id is idempotent "already gone" and
    /// yields `false`.
    pub async fn cancel_job(&self, service: &HostedService, job_id: u32) -> Result<bool> {
        let req = envelope::cancel_job(&self.client_urn, &service.endpoint, job_id);
        let body = self.exchange(service, &req).await?;
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            if fault.is_job_id_not_found() {
                return Ok(false);
            }
            return Err(Error::Fault(fault));
        }
        info!(job_id, "scan job canceled");
        Ok(true)
    }

    pub async fn get_job_elements(
        &self,
        service: &HostedService,
        job_id: u32,
    ) -> Result<JobElements> {
        let req = envelope::get_job_elements(&self.client_urn, &service.endpoint, job_id);
        let body = self.exchange(service, &req).await?;
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            return Err(Error::Fault(fault));
        }
        let root = doc.root_element();
        let status = soap::find(root, ns::SCA, "JobStatus")
            .and_then(parsers::parse_job_status)
            .ok_or_else(|| Error::MalformedResponse("no JobStatus element".into()))?;
        let ticket = soap::find(root, ns::SCA, "ScanTicket")
            .and_then(parsers::parse_scan_ticket)
            .ok_or_else(|| Error::MalformedResponse("no ScanTicket element".into()))?;
        let documents = soap::find_all(root, ns::SCA, "DocumentName")
            .into_iter()
            .filter_map(|n| n.text().map(|t| t.trim().to_string()))
            .collect();
        Ok(JobElements {
            status,
            ticket,
            documents,
        })
    }

    async fn job_summaries(&self, service: &HostedService, req: String) -> Result<Vec<JobSummary>> {
        let body = self.exchange(service, &req).await?;
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            return Err(Error::Fault(fault));
        }
        Ok(soap::find_all(doc.root_element(), ns::SCA, "JobSummary")
            .into_iter()
            .filter_map(parsers::parse_job_summary)
            .collect())
    }

    pub async fn get_active_jobs(&self, service: &HostedService) -> Result<Vec<JobSummary>> {
        self.job_summaries(
            service,
            envelope::get_active_jobs(&self.client_urn, &service.endpoint),
        )
        .await
    }

    /// Some devices keep no job history; those answer with an empty list.
    pub async fn get_job_history(&self, service: &HostedService) -> Result<Vec<JobSummary>> {
        self.job_summaries(
            service,
            envelope::get_job_history(&self.client_urn, &service.endpoint),
        )
        .await
    }

    /// Pull the next image batch of a job.
    ///
    /// A `ClientErrorNoImagesAvailable` fault is the normal end-of-job
    /// signal and yields `(0, [])`; any other fault propagates. A multipart
    /// reply yields one image per encoded frame, in frame order.
    pub async fn retrieve_image(
        &self,
        service: &HostedService,
        job: &ScanJob,
        doc_name: &str,
    ) -> Result<(usize, Vec<DynamicImage>)> {
        let req = envelope::retrieve_image(
            &self.client_urn,
            &service.endpoint,
            job.id,
            &job.token,
            doc_name,
        );
        let resp = self
            .transport
            .post(&service.endpoint, &req, self.timeout)
            .await?;

        if resp.content_type.to_ascii_lowercase().contains("multipart") {
            let frames = images::extract_images(&resp.content_type, &resp.body)?;
            info!(job_id = job.id, frames = frames.len(), "image batch retrieved");
            return Ok((frames.len(), frames));
        }

        let body = resp.body_str().into_owned();
        let doc = Document::parse(&body)?;
        if let Some(fault) = soap::fault_of(&doc) {
            if fault.is_no_images_available() {
                debug!(job_id = job.id, "no images available");
                return Ok((0, Vec::new()));
            }
            return Err(Error::Fault(fault));
        }
        warn!(job_id = job.id, content_type = %resp.content_type, "unexpected RetrieveImage reply");
        Err(Error::MalformedResponse(
            "RetrieveImage reply neither fault nor multipart".into(),
        ))
    }
}
