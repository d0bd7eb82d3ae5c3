// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Response parsers for the scan schema.
//!
//! Parsers take the enclosing element (ticket, status, configuration, ...)
//! and return typed structures; `Option` marks elements whose required
//! fields may be missing on non-compliant devices.

use roxmltree::Node;

use super::{
    DocumentParams, ImageGeometry, InputSource, JobState, JobStatus, JobSummary, MediaSide,
    ScanJob, ScanTicket, ScannerCondition, ScannerConfiguration, ScannerDescription,
    ScannerSettings, ScannerStatus, SourceSettings,
};
use crate::soap::{self, ns};

fn text(node: Node<'_, '_>, local: &str) -> Option<String> {
    soap::text(node, ns::SCA, local)
}

fn int(node: Node<'_, '_>, local: &str) -> Option<u32> {
    soap::int(node, ns::SCA, local)
}

fn boolean(node: Node<'_, '_>, local: &str) -> bool {
    soap::boolean(node, ns::SCA, local).unwrap_or(false)
}

fn find<'a, 'd>(node: Node<'a, 'd>, local: &str) -> Option<Node<'a, 'd>> {
    soap::find(node, ns::SCA, local)
}

fn pair(node: Node<'_, '_>, w: &str, h: &str) -> Option<(u32, u32)> {
    Some((int(node, w)?, int(node, h)?))
}

pub fn parse_media_side(node: Node<'_, '_>) -> MediaSide {
    let mut side = MediaSide::default();
    if let Some(region) = find(node, "ScanRegion") {
        side.offset = (
            int(region, "ScanRegionXOffset").unwrap_or(0),
            int(region, "ScanRegionYOffset").unwrap_or(0),
        );
        if let Some(size) = pair(region, "ScanRegionWidth", "ScanRegionHeight") {
            side.size = size;
        }
    }
    side.color = text(node, "ColorProcessing").unwrap_or_default();
    if let Some(res) = find(node, "Resolution") {
        side.resolution = pair(res, "Width", "Height").unwrap_or((0, 0));
    }
    side
}

pub fn parse_document_params(node: Node<'_, '_>) -> DocumentParams {
    let mut p = DocumentParams {
        format: text(node, "Format").unwrap_or_default(),
        compression_factor: int(node, "CompressionQualityFactor").unwrap_or(0),
        images_to_transfer: int(node, "ImagesToTransfer").unwrap_or(0),
        input_source: text(node, "InputSource")
            .map(|s| InputSource::from_wire(&s))
            .unwrap_or(InputSource::Auto),
        content_type: text(node, "ContentType").unwrap_or_default(),
        rotation: int(node, "Rotation").unwrap_or(0),
        ..Default::default()
    };
    if let Some(input) = find(node, "InputSize") {
        p.size_autodetect = boolean(input, "DocumentAutoDetect");
        if let Some(media) = find(input, "InputMediaSize") {
            p.input_size = pair(media, "Width", "Height").unwrap_or((0, 0));
        }
    }
    if let Some(exposure) = find(node, "Exposure") {
        p.auto_exposure = boolean(exposure, "AutoExposure");
        if let Some(settings) = find(exposure, "ExposureSettings") {
            p.contrast = soap::int(settings, ns::SCA, "Contrast").unwrap_or(0);
            p.brightness = soap::int(settings, ns::SCA, "Brightness").unwrap_or(0);
            p.sharpness = soap::int(settings, ns::SCA, "Sharpness").unwrap_or(0);
        }
    }
    if let Some(scaling) = find(node, "Scaling") {
        p.scaling = pair(scaling, "ScalingWidth", "ScalingHeight").unwrap_or((100, 100));
    }
    if let Some(sides) = find(node, "MediaSides") {
        if let Some(front) = find(sides, "MediaFront") {
            p.front = parse_media_side(front);
        }
        // a missing back side mirrors the front
        p.back = match find(sides, "MediaBack") {
            Some(back) => parse_media_side(back),
            None => p.front.clone(),
        };
    }
    p
}

pub fn parse_scan_ticket(node: Node<'_, '_>) -> Option<ScanTicket> {
    let description = find(node, "JobDescription")?;
    let params = find(node, "DocumentParameters")?;
    Some(ScanTicket {
        job_name: text(description, "JobName").unwrap_or_default(),
        job_user_name: text(description, "JobOriginatingUserName").unwrap_or_default(),
        job_info: text(description, "JobInformation").unwrap_or_default(),
        params: parse_document_params(params),
    })
}

pub fn parse_scan_job(node: Node<'_, '_>) -> Option<ScanJob> {
    let geometry = |info: Node<'_, '_>| -> Option<ImageGeometry> {
        Some(ImageGeometry {
            pixels_per_line: int(info, "PixelsPerLine")?,
            number_of_lines: int(info, "NumberOfLines")?,
            bytes_per_line: int(info, "BytesPerLine")?,
        })
    };
    let front = find(node, "MediaFrontImageInfo").and_then(geometry)?;
    let back = find(node, "MediaBackImageInfo").and_then(geometry);
    let final_params = find(node, "DocumentFinalParameters")
        .map(parse_document_params)
        .unwrap_or_default();
    Some(ScanJob {
        id: int(node, "JobId")?,
        token: text(node, "JobToken")?,
        front,
        back,
        final_params,
    })
}

pub fn parse_job_status(node: Node<'_, '_>) -> Option<JobStatus> {
    let state = text(node, "JobState")
        .or_else(|| text(node, "JobCompletedState"))
        .map(|s| JobState::from_wire(&s))?;
    Some(JobStatus {
        id: int(node, "JobId")?,
        state,
        reasons: find(node, "JobStateReasons")
            .map(|r| {
                soap::find_all(r, ns::SCA, "JobStateReason")
                    .into_iter()
                    .filter_map(|n| n.text().map(|t| t.trim().to_string()))
                    .collect()
            })
            .unwrap_or_default(),
        scans_completed: int(node, "ScansCompleted").unwrap_or(0),
        created_time: text(node, "JobCreatedTime").unwrap_or_default(),
        completed_time: text(node, "JobCompletedTime").unwrap_or_default(),
    })
}

pub fn parse_job_summary(node: Node<'_, '_>) -> Option<JobSummary> {
    Some(JobSummary {
        name: text(node, "JobName").unwrap_or_default(),
        user_name: text(node, "JobOriginatingUserName").unwrap_or_default(),
        status: parse_job_status(node)?,
    })
}

pub fn parse_scanner_condition(node: Node<'_, '_>) -> Option<ScannerCondition> {
    Some(ScannerCondition {
        id: node.attribute("Id").and_then(|v| v.parse().ok())?,
        time: text(node, "Time").unwrap_or_default(),
        name: text(node, "Name").unwrap_or_default(),
        component: text(node, "Component").unwrap_or_default(),
        severity: text(node, "Severity").unwrap_or_default(),
    })
}

pub fn parse_scanner_description(node: Node<'_, '_>) -> ScannerDescription {
    ScannerDescription {
        name: text(node, "ScannerName").unwrap_or_default(),
        info: text(node, "ScannerInfo").unwrap_or_default(),
        location: text(node, "ScannerLocation").unwrap_or_default(),
    }
}

pub fn parse_scanner_status(node: Node<'_, '_>) -> ScannerStatus {
    let mut status = ScannerStatus {
        time: text(node, "ScannerCurrentTime").unwrap_or_default(),
        state: text(node, "ScannerState").unwrap_or_default(),
        ..Default::default()
    };
    if let Some(active) = find(node, "ActiveConditions") {
        for cond in soap::find_all(active, ns::SCA, "DeviceCondition") {
            if let Some(c) = parse_scanner_condition(cond) {
                status.active_conditions.insert(c.id, c);
            }
        }
    }
    if let Some(reasons) = find(node, "ScannerStateReasons") {
        status.reasons = soap::find_all(reasons, ns::SCA, "ScannerStateReason")
            .into_iter()
            .filter_map(|n| n.text().map(|t| t.trim().to_string()))
            .collect();
    }
    if let Some(history) = find(node, "ConditionHistory") {
        for entry in soap::find_all(history, ns::SCA, "ConditionHistoryEntry") {
            if let (Some(clear_time), Some(c)) =
                (text(entry, "ClearTime"), parse_scanner_condition(entry))
            {
                status.conditions_history.push((clear_time, c));
            }
        }
    }
    status
}

fn parse_source_settings(node: Node<'_, '_>, prefix: &str) -> SourceSettings {
    let named = |suffix: &str| format!("{}{}", prefix, suffix);
    let mut s = SourceSettings::default();
    if let Some(optical) = find(node, &named("OpticalResolution")) {
        s.optical_resolution = pair(optical, "Width", "Height").unwrap_or((0, 0));
    }
    if let Some(res) = find(node, &named("Resolutions")) {
        s.width_resolutions = find(res, "Widths")
            .map(|w| {
                soap::find_all(w, ns::SCA, "Width")
                    .into_iter()
                    .filter_map(|n| n.text().map(|t| t.trim().to_string()))
                    .collect()
            })
            .unwrap_or_default();
        s.height_resolutions = find(res, "Heights")
            .map(|h| {
                soap::find_all(h, ns::SCA, "Height")
                    .into_iter()
                    .filter_map(|n| n.text().map(|t| t.trim().to_string()))
                    .collect()
            })
            .unwrap_or_default();
    }
    if let Some(color) = find(node, &named("Color")) {
        s.color_modes = soap::find_all(color, ns::SCA, "ColorEntry")
            .into_iter()
            .filter_map(|n| n.text().map(|t| t.trim().to_string()))
            .collect();
    }
    if let Some(min) = find(node, &named("MinimumSize")) {
        s.min_size = pair(min, "Width", "Height").unwrap_or((0, 0));
    }
    if let Some(max) = find(node, &named("MaximumSize")) {
        s.max_size = pair(max, "Width", "Height").unwrap_or((0, 0));
    }
    s
}

pub fn parse_scanner_configuration(node: Node<'_, '_>) -> ScannerConfiguration {
    let mut config = ScannerConfiguration::default();
    if let Some(device) = find(node, "DeviceSettings") {
        let mut s = ScannerSettings {
            size_autodetect_supported: boolean(device, "DocumentSizeAutoDetectSupported"),
            auto_exposure_supported: boolean(device, "AutoExposureSupported"),
            brightness_supported: boolean(device, "BrightnessSupported"),
            contrast_supported: boolean(device, "ContrastSupported"),
            ..Default::default()
        };
        if let Some(formats) = find(device, "FormatsSupported") {
            s.formats = soap::find_all(formats, ns::SCA, "FormatValue")
                .into_iter()
                .filter_map(|n| n.text().map(|t| t.trim().to_string()))
                .collect();
        }
        if let Some(cqf) = find(device, "CompressionQualityFactorSupported") {
            s.compression_range = pair(cqf, "MinValue", "MaxValue").unwrap_or((0, 0));
        }
        if let Some(types) = find(device, "ContentTypesSupported") {
            s.content_types = soap::find_all(types, ns::SCA, "ContentTypeValue")
                .into_iter()
                .filter_map(|n| n.text().map(|t| t.trim().to_string()))
                .collect();
        }
        if let Some(scaling) = find(device, "ScalingRangeSupported") {
            if let Some(w) = find(scaling, "ScalingWidth") {
                s.scaling_range_width = pair(w, "MinValue", "MaxValue").unwrap_or((0, 0));
            }
            if let Some(h) = find(scaling, "ScalingHeight") {
                s.scaling_range_height = pair(h, "MinValue", "MaxValue").unwrap_or((0, 0));
            }
        }
        if let Some(rotations) = find(device, "RotationsSupported") {
            s.rotations = soap::find_all(rotations, ns::SCA, "RotationValue")
                .into_iter()
                .filter_map(|n| n.text().map(|t| t.trim().to_string()))
                .collect();
        }
        config.settings = s;
    }
    if let Some(platen) = find(node, "Platen") {
        config.platen = Some(parse_source_settings(platen, "Platen"));
    }
    if let Some(adf) = find(node, "ADF") {
        config.adf_duplex = boolean(adf, "ADFSupportsDuplex");
        config.front_adf = find(adf, "ADFFront").map(|f| parse_source_settings(f, "ADF"));
        config.back_adf = find(adf, "ADFBack").map(|b| parse_source_settings(b, "ADF"));
    }
    config
}
