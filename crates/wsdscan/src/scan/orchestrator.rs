// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! # Scan job orchestration
//!
//! Drives a full acquisition: ticket preparation, validation, the job loop
//! and file output. Two entry points share the same loop:
//!
//! | Entry                          | Trigger                              |
//! |--------------------------------|--------------------------------------|
//! | [`ScanOrchestrator::scan_with_profile`] | operator / CLI              |
//! | [`device_initiated_scan_worker`]        | `ScanAvailableEvent` push   |
//!
//! Source selection: a profile asking for `Auto` starts on the ADF and falls
//! back to the platen exactly once if the feeder yields nothing. A platen
//! pass is always single-shot. Ending with zero images is a successful empty
//! scan, not an error.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::{debug, error, info, warn};

use super::ops::ScanClient;
use super::{InputSource, ScanTicket};
use crate::config::ScanProfile;
use crate::error::{Error, Result};
use crate::events::registry::ContextRegistry;
use crate::transfer::HostedService;

/// Receives the saved files of a finished scan. Delivery is fire-and-forget;
/// implementors log their own failures.
pub trait Export: Send + Sync {
    fn deliver(&self, paths: &[PathBuf]);
}

/// Default export that only announces the files.
pub struct LogExport;

impl Export for LogExport {
    fn deliver(&self, paths: &[PathBuf]) {
        for path in paths {
            info!(path = %path.display(), "scan file ready");
        }
    }
}

fn job_name_now() -> String {
    Local::now().format("scan-%Y-%m-%d_%H_%M_%S").to_string()
}

/// Write one file per image into the profile's target folder, named
/// `{job_name}_{n}.{format}`.
pub fn save_images(
    images: &[DynamicImage],
    profile: &ScanProfile,
    job_name: &str,
) -> Result<Vec<PathBuf>> {
    let folder = Path::new(&profile.target_folder);
    std::fs::create_dir_all(folder)?;
    let mut paths = Vec::with_capacity(images.len());
    for (n, img) in images.iter().enumerate() {
        let path = folder.join(format!("{}_{}.{}", job_name, n + 1, profile.image_format));
        match profile.image_format.as_str() {
            "jpeg" | "jpg" => {
                let mut out = BufWriter::new(File::create(&path)?);
                let encoder = JpegEncoder::new_with_quality(&mut out, profile.quality);
                img.write_with_encoder(encoder)?;
            }
            _ => img.save(&path)?,
        }
        debug!(path = %path.display(), "image written");
        paths.push(path);
    }
    Ok(paths)
}

pub struct ScanOrchestrator {
    client: ScanClient,
    export: Arc<dyn Export>,
}

impl ScanOrchestrator {
    pub fn new(client: ScanClient, export: Arc<dyn Export>) -> Self {
        Self { client, export }
    }

    /// Run the job loop for a validated ticket and collect every acquired
    /// image. New jobs are created until the source runs dry; each job pulls
    /// one image batch.
    pub async fn run_job(
        &self,
        service: &HostedService,
        ticket: &ScanTicket,
        scan_identifier: &str,
        dest_token: &str,
    ) -> Result<Vec<DynamicImage>> {
        let mut source = ticket.params.input_source;
        let mut platen_fallback = source == InputSource::Auto;
        if source == InputSource::Auto {
            source = InputSource::Adf;
        }
        let mut images = Vec::new();
        loop {
            let mut attempt = ticket.clone();
            attempt.params.input_source = source;
            let job = self
                .client
                .create_job(service, &attempt, scan_identifier, dest_token)
                .await?;
            let (count, frames) = self
                .client
                .retrieve_image(service, &job, &attempt.job_name)
                .await?;
            if count == 0 {
                if platen_fallback {
                    debug!("feeder empty, retrying once on the platen");
                    source = InputSource::Platen;
                    platen_fallback = false;
                    continue;
                }
                break;
            }
            images.extend(frames);
            if source == InputSource::Platen {
                break;
            }
            // the feeder may hold more sheets; keep pulling until it is empty
            platen_fallback = false;
        }
        Ok(images)
    }

    /// Snapshot the device and overlay the profile onto its default ticket.
    async fn prepare_ticket(
        &self,
        service: &HostedService,
        profile: &ScanProfile,
    ) -> Result<ScanTicket> {
        let elements = self.client.get_scanner_elements(service).await?;
        let mut ticket = elements.default_ticket;
        ticket.job_name = job_name_now();
        ticket.job_user_name = "wsdscan".to_string();
        ticket.apply_profile(profile);
        Ok(ticket)
    }

    /// Acquire, save and hand the files to the exporter.
    async fn finish(
        &self,
        service: &HostedService,
        profile: &ScanProfile,
        ticket: &ScanTicket,
        scan_identifier: &str,
        dest_token: &str,
    ) -> Result<Vec<PathBuf>> {
        let images = self
            .run_job(service, ticket, scan_identifier, dest_token)
            .await?;
        if images.is_empty() {
            info!("scan finished with no pages");
            return Ok(Vec::new());
        }
        let paths = save_images(&images, profile, &ticket.job_name)?;
        info!(files = paths.len(), "scan finished");
        self.export.deliver(&paths);
        Ok(paths)
    }

    /// Client-initiated scan: snapshot the device, overlay the profile,
    /// validate, acquire, save and hand the files to the exporter.
    pub async fn scan_with_profile(
        &self,
        service: &HostedService,
        profile: &ScanProfile,
    ) -> Result<Vec<PathBuf>> {
        let ticket = self.prepare_ticket(service, profile).await?;
        let (valid, ticket) = self.client.validate_ticket(service, ticket).await?;
        if !valid {
            return Err(Error::TicketRejected);
        }
        self.finish(service, profile, &ticket, "", "").await
    }

    /// Device-initiated scan: the ticket derives from the device's own
    /// defaults, so it is submitted uncorrected without a validation
    /// round-trip.
    pub async fn scan_on_event(
        &self,
        service: &HostedService,
        profile: &ScanProfile,
        scan_identifier: &str,
        dest_token: &str,
    ) -> Result<Vec<PathBuf>> {
        let ticket = self.prepare_ticket(service, profile).await?;
        self.finish(service, profile, &ticket, scan_identifier, dest_token)
            .await
    }
}

/// Handle one `ScanAvailableEvent`: look the client context up in the
/// registry and run the acquisition with the device's scan identifier and
/// our destination token. Runs on its own task; failures are logged, never
/// propagated into the event server.
pub async fn device_initiated_scan_worker(
    orchestrator: Arc<ScanOrchestrator>,
    registry: Arc<ContextRegistry>,
    client_context: String,
    scan_identifier: String,
) {
    let Some(slot) = registry.lookup(&client_context) else {
        warn!(client_context, "ScanAvailableEvent for unknown context");
        return;
    };
    info!(client_context, scan_identifier, "device-initiated scan");
    match orchestrator
        .scan_on_event(
            &slot.service,
            &slot.profile,
            &scan_identifier,
            &slot.destination_token,
        )
        .await
    {
        Ok(paths) if paths.is_empty() => info!(client_context, "empty device-initiated scan"),
        Ok(_) => {}
        Err(e) => error!(client_context, error = %e, "device-initiated scan failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaperSize;
    use crate::error::Result;
    use crate::soap::{action, ns};
    use crate::transport::{SoapResponse, Transport};
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::Duration;

    fn job_response(id: u32) -> SoapResponse {
        let body = format!(
            r#"<soap:Envelope xmlns:soap="{soap}" xmlns:wsa="{wsa}" xmlns:sca="{sca}">
<soap:Header><wsa:Action>{act}Response</wsa:Action><wsa:MessageID>urn:uuid:j</wsa:MessageID></soap:Header>
<soap:Body><sca:CreateScanJobResponse>
<sca:JobId>{id}</sca:JobId><sca:JobToken>tok-{id}</sca:JobToken>
<sca:ImageInformation><sca:MediaFrontImageInfo>
<sca:PixelsPerLine>8</sca:PixelsPerLine><sca:NumberOfLines>8</sca:NumberOfLines><sca:BytesPerLine>8</sca:BytesPerLine>
</sca:MediaFrontImageInfo></sca:ImageInformation>
</sca:CreateScanJobResponse></soap:Body></soap:Envelope>"#,
            soap = ns::SOAP,
            wsa = ns::WSA,
            sca = ns::SCA,
            act = action::scan_event("CreateScanJob"),
            id = id,
        );
        SoapResponse {
            content_type: "application/soap+xml".into(),
            body: body.into_bytes(),
        }
    }

    fn no_images() -> SoapResponse {
        let body = format!(
            r#"<soap:Envelope xmlns:soap="{soap}" xmlns:wsa="{wsa}">
<soap:Header><wsa:Action>{fault}</wsa:Action><wsa:MessageID>urn:uuid:f</wsa:MessageID></soap:Header>
<soap:Body><soap:Fault><soap:Code><soap:Value>soap:Sender</soap:Value>
<soap:Subcode><soap:Value>wscn:ClientErrorNoImagesAvailable</soap:Value></soap:Subcode></soap:Code>
<soap:Reason><soap:Text>empty</soap:Text></soap:Reason></soap:Fault></soap:Body></soap:Envelope>"#,
            soap = ns::SOAP,
            wsa = ns::WSA,
            fault = action::FAULT,
        );
        SoapResponse {
            content_type: "application/soap+xml".into(),
            body: body.into_bytes(),
        }
    }

    fn one_page() -> SoapResponse {
        let img = image::GrayImage::from_pixel(4, 4, image::Luma([128]));
        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();
        let boundary = "frame";
        let mut body = format!(
            "--{b}\r\nContent-Type: application/soap+xml\r\n\r\n<x/>\r\n--{b}\r\nContent-Type: image/png\r\n\r\n",
            b = boundary
        )
        .into_bytes();
        body.extend_from_slice(&png.into_inner());
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        SoapResponse {
            content_type: format!("multipart/related; boundary={}", boundary),
            body,
        }
    }

    struct Scripted {
        replies: Mutex<Vec<SoapResponse>>,
        requests: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<SoapResponse>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn post(&self, _: &str, body: &str, _: Duration) -> Result<SoapResponse> {
            self.requests.lock().unwrap().push(body.to_string());
            Ok(self.replies.lock().unwrap().remove(0))
        }
    }

    fn orchestrator(t: Arc<Scripted>) -> ScanOrchestrator {
        ScanOrchestrator::new(
            ScanClient::new(t, "urn:uuid:client".into(), Duration::from_secs(1)),
            Arc::new(LogExport),
        )
    }

    fn service() -> HostedService {
        HostedService {
            endpoint: "http://10.0.0.9:8018/scan".into(),
            types: vec!["sca:ScannerServiceType".into()],
            ..Default::default()
        }
    }

    fn ticket(source: InputSource) -> ScanTicket {
        let mut ticket = ScanTicket {
            job_name: "scan-test".into(),
            ..Default::default()
        };
        ticket.params.input_source = source;
        ticket
    }

    fn profile(folder: &Path, format: &str) -> ScanProfile {
        ScanProfile {
            id: "ctx-1".into(),
            name: "Desk".into(),
            paper_size: PaperSize::A4,
            color: None,
            resolution: 300,
            format: None,
            input_src: "Platen".into(),
            image_format: format.into(),
            quality: 85,
            target_folder: folder.to_string_lossy().into_owned(),
            use_pdf: false,
        }
    }

    #[tokio::test]
    async fn test_auto_falls_back_to_platen_exactly_once() {
        let t = Scripted::new(vec![job_response(1), no_images(), job_response(2), one_page()]);
        let images = orchestrator(t.clone())
            .run_job(&service(), &ticket(InputSource::Auto), "", "")
            .await
            .unwrap();
        assert_eq!(images.len(), 1);
        let requests = t.requests.lock().unwrap();
        assert_eq!(requests.len(), 4);
        assert!(requests[0].contains(">ADF<"));
        assert!(requests[2].contains(">Platen<"));
    }

    #[tokio::test]
    async fn test_adf_drains_until_feeder_empty() {
        let t = Scripted::new(vec![
            job_response(1),
            one_page(),
            job_response(2),
            one_page(),
            job_response(3),
            no_images(),
        ]);
        let images = orchestrator(t.clone())
            .run_job(&service(), &ticket(InputSource::Adf), "", "")
            .await
            .unwrap();
        assert_eq!(images.len(), 2);
        // no Platen retry once the explicit ADF run ends
        assert!(t.requests.lock().unwrap().iter().all(|r| !r.contains(">Platen<")));
    }

    #[tokio::test]
    async fn test_zero_images_is_success() {
        let t = Scripted::new(vec![job_response(1), no_images()]);
        let images = orchestrator(t)
            .run_job(&service(), &ticket(InputSource::Platen), "", "")
            .await
            .unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn test_save_images_numbers_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec![
            DynamicImage::ImageLuma8(image::GrayImage::from_pixel(2, 2, image::Luma([1]))),
            DynamicImage::ImageLuma8(image::GrayImage::from_pixel(2, 2, image::Luma([2]))),
        ];
        let paths = save_images(&images, &profile(dir.path(), "png"), "scan-x").unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("scan-x_1.png"));
        assert!(paths[1].ends_with("scan-x_2.png"));
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_save_images_jpeg_uses_profile_quality() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec![DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            8,
            8,
            image::Rgb([40, 80, 120]),
        ))];
        let paths = save_images(&images, &profile(dir.path(), "jpeg"), "scan-j").unwrap();
        assert_eq!(paths.len(), 1);
        let data = std::fs::read(&paths[0]).unwrap();
        // JFIF magic
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
    }
}
