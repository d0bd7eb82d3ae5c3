// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! # Scan service data model
//!
//! Typed views of the WSD scan schema: tickets, jobs, status snapshots and
//! scanner capability descriptions. Parsing lives in [`parsers`], operations
//! in [`ops`], image extraction in [`images`] and the job state machine in
//! [`orchestrator`].

pub mod images;
pub mod ops;
pub mod orchestrator;
pub mod parsers;

use std::collections::HashMap;

use crate::config::ScanProfile;
use crate::soap::ns;

/// Paper input source. `Auto` is resolved by the orchestrator: ADF first,
/// one Platen fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Auto,
    Adf,
    Platen,
}

impl InputSource {
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Adf => "ADF",
            Self::Platen => "Platen",
        }
    }

    pub fn from_wire(s: &str) -> Self {
        match s {
            "ADF" => Self::Adf,
            "Platen" => Self::Platen,
            _ => Self::Auto,
        }
    }
}

/// Geometry and color of one media side (front or back).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSide {
    pub offset: (u32, u32),
    pub size: (u32, u32),
    pub color: String,
    pub resolution: (u32, u32),
}

/// The full parameter block of a ticket or of a job's final parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentParams {
    pub format: String,
    pub compression_factor: u32,
    pub images_to_transfer: u32,
    pub input_source: InputSource,
    pub content_type: String,
    pub size_autodetect: bool,
    pub input_size: (u32, u32),
    pub auto_exposure: bool,
    pub contrast: i32,
    pub brightness: i32,
    pub sharpness: i32,
    pub scaling: (u32, u32),
    pub rotation: u32,
    pub front: MediaSide,
    pub back: MediaSide,
}

impl Default for DocumentParams {
    fn default() -> Self {
        Self {
            format: String::new(),
            compression_factor: 0,
            images_to_transfer: 0,
            input_source: InputSource::Auto,
            content_type: String::new(),
            size_autodetect: false,
            input_size: (0, 0),
            auto_exposure: false,
            contrast: 0,
            brightness: 0,
            sharpness: 0,
            scaling: (100, 100),
            rotation: 0,
            front: MediaSide::default(),
            back: MediaSide::default(),
        }
    }
}

/// The negotiated parameter set for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanTicket {
    pub job_name: String,
    pub job_user_name: String,
    pub job_info: String,
    pub params: DocumentParams,
}

impl ScanTicket {
    /// Overlay a profile onto this ticket (usually the device default one).
    pub fn apply_profile(&mut self, profile: &ScanProfile) {
        let extent = profile.paper_size.extent();
        self.params.input_size = extent;
        self.params.front.size = extent;
        if let Some(color) = &profile.color {
            self.params.front.color = color.clone();
        }
        self.params.front.resolution = (profile.resolution, profile.resolution);
        self.params.format = profile
            .format
            .clone()
            .unwrap_or_else(|| "tiff-single-uncompressed".to_string());
        self.params.input_source = InputSource::from_wire(&profile.input_src);
        self.params.compression_factor = 100;
        self.params.images_to_transfer = 1;
    }

    fn media_side_xml(tag: &str, side: &MediaSide) -> String {
        format!(
            "<sca:{tag}><sca:ScanRegion><sca:ScanRegionXOffset>{xo}</sca:ScanRegionXOffset><sca:ScanRegionYOffset>{yo}</sca:ScanRegionYOffset><sca:ScanRegionWidth>{w}</sca:ScanRegionWidth><sca:ScanRegionHeight>{h}</sca:ScanRegionHeight></sca:ScanRegion><sca:ColorProcessing>{color}</sca:ColorProcessing><sca:Resolution><sca:Width>{rw}</sca:Width><sca:Height>{rh}</sca:Height></sca:Resolution></sca:{tag}>",
            tag = tag,
            xo = side.offset.0,
            yo = side.offset.1,
            w = side.size.0,
            h = side.size.1,
            color = side.color,
            rw = side.resolution.0,
            rh = side.resolution.1,
        )
    }

    /// The `sca:ScanTicket` fragment embedded into validate/create requests.
    /// The back side mirrors the front when it was never set explicitly.
    pub fn to_xml(&self) -> String {
        let p = &self.params;
        let back = if p.back == MediaSide::default() {
            &p.front
        } else {
            &p.back
        };
        format!(
            "<sca:ScanTicket xmlns:sca=\"{ns}\"><sca:JobDescription><sca:JobName>{name}</sca:JobName><sca:JobOriginatingUserName>{user}</sca:JobOriginatingUserName><sca:JobInformation>{info}</sca:JobInformation></sca:JobDescription><sca:DocumentParameters><sca:Format>{format}</sca:Format><sca:CompressionQualityFactor>{cqf}</sca:CompressionQualityFactor><sca:ImagesToTransfer>{imgs}</sca:ImagesToTransfer><sca:InputSource>{src}</sca:InputSource><sca:ContentType>{ctype}</sca:ContentType><sca:InputSize><sca:DocumentAutoDetect>{autod}</sca:DocumentAutoDetect><sca:InputMediaSize><sca:Width>{iw}</sca:Width><sca:Height>{ih}</sca:Height></sca:InputMediaSize></sca:InputSize><sca:Exposure><sca:AutoExposure>{autoe}</sca:AutoExposure><sca:ExposureSettings><sca:Contrast>{contrast}</sca:Contrast><sca:Brightness>{brightness}</sca:Brightness><sca:Sharpness>{sharpness}</sca:Sharpness></sca:ExposureSettings></sca:Exposure><sca:Scaling><sca:ScalingWidth>{sw}</sca:ScalingWidth><sca:ScalingHeight>{sh}</sca:ScalingHeight></sca:Scaling><sca:Rotation>{rot}</sca:Rotation><sca:MediaSides>{front}{back}</sca:MediaSides></sca:DocumentParameters></sca:ScanTicket>",
            ns = ns::SCA,
            name = self.job_name,
            user = self.job_user_name,
            info = self.job_info,
            format = p.format,
            cqf = p.compression_factor,
            imgs = p.images_to_transfer,
            src = p.input_source.as_wire(),
            ctype = p.content_type,
            autod = p.size_autodetect,
            iw = p.input_size.0,
            ih = p.input_size.1,
            autoe = p.auto_exposure,
            contrast = p.contrast,
            brightness = p.brightness,
            sharpness = p.sharpness,
            sw = p.scaling.0,
            sh = p.scaling.1,
            rot = p.rotation,
            front = Self::media_side_xml("MediaFront", &p.front),
            back = Self::media_side_xml("MediaBack", back),
        )
    }
}

/// Per-side raster geometry reported at job creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageGeometry {
    pub pixels_per_line: u32,
    pub number_of_lines: u32,
    pub bytes_per_line: u32,
}

/// One in-progress acquisition. The token is required for image retrieval.
#[derive(Debug, Clone, Default)]
pub struct ScanJob {
    pub id: u32,
    pub token: String,
    pub front: ImageGeometry,
    pub back: Option<ImageGeometry>,
    pub final_params: DocumentParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Canceled,
    Aborted,
    Held,
    Other(String),
}

impl JobState {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "Processing" | "Started" => Self::Processing,
            "Completed" => Self::Completed,
            "Canceled" => Self::Canceled,
            "Aborted" => Self::Aborted,
            "Held" => Self::Held,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Aborted)
    }
}

/// Status snapshot of one job, delivered by polling or by event.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub id: u32,
    pub state: JobState,
    pub reasons: Vec<String>,
    pub scans_completed: u32,
    pub created_time: String,
    pub completed_time: String,
}

/// Terminal (or active-list) summary of a job.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub name: String,
    pub user_name: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerCondition {
    pub id: u32,
    pub time: String,
    pub name: String,
    pub component: String,
    pub severity: String,
}

/// Device status with the accumulated condition set and history.
#[derive(Debug, Clone, Default)]
pub struct ScannerStatus {
    pub time: String,
    pub state: String,
    pub reasons: Vec<String>,
    pub active_conditions: HashMap<u32, ScannerCondition>,
    /// Cleared conditions paired with their clear time.
    pub conditions_history: Vec<(String, ScannerCondition)>,
}

#[derive(Debug, Clone, Default)]
pub struct ScannerDescription {
    pub name: String,
    pub info: String,
    pub location: String,
}

/// Device-wide capabilities independent of the input source.
#[derive(Debug, Clone, Default)]
pub struct ScannerSettings {
    pub formats: Vec<String>,
    pub compression_range: (u32, u32),
    pub content_types: Vec<String>,
    pub size_autodetect_supported: bool,
    pub auto_exposure_supported: bool,
    pub brightness_supported: bool,
    pub contrast_supported: bool,
    pub scaling_range_width: (u32, u32),
    pub scaling_range_height: (u32, u32),
    pub rotations: Vec<String>,
}

/// Capabilities of one input source (platen, ADF front, ADF back).
#[derive(Debug, Clone, Default)]
pub struct SourceSettings {
    pub optical_resolution: (u32, u32),
    pub width_resolutions: Vec<String>,
    pub height_resolutions: Vec<String>,
    pub color_modes: Vec<String>,
    pub min_size: (u32, u32),
    pub max_size: (u32, u32),
}

#[derive(Debug, Clone, Default)]
pub struct ScannerConfiguration {
    pub settings: ScannerSettings,
    pub platen: Option<SourceSettings>,
    pub adf_duplex: bool,
    pub front_adf: Option<SourceSettings>,
    pub back_adf: Option<SourceSettings>,
}
