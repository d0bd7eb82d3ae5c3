// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Image extraction from RetrieveImage replies.
//!
//! A successful reply is a MIME multipart document: one SOAP part followed
//! by the binary image part. The image may itself be a multi-page container
//! (TIFF), in which case every frame is re-materialized as an independent
//! [`DynamicImage`] in frame order.

use std::collections::HashMap;
use std::io::Cursor;

use base64::Engine;
use image::DynamicImage;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;

use crate::error::{Error, Result};

/// Pull the `boundary` parameter out of a multipart content-type header.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|param| {
        let (name, value) = param.trim().split_once('=')?;
        if name.eq_ignore_ascii_case("boundary") {
            Some(value.trim_matches('"').to_string())
        } else {
            None
        }
    })
}

#[derive(Debug)]
pub struct MimePart {
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub data: Vec<u8>,
}

impl MimePart {
    fn content_type(&self) -> &str {
        self.headers
            .get("content-type")
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn find_sub(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < from + needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn parse_part(raw: &[u8]) -> Option<MimePart> {
    let split = find_sub(raw, b"\r\n\r\n", 0).map(|p| (p, p + 4)).or_else(|| {
        find_sub(raw, b"\n\n", 0).map(|p| (p, p + 2))
    })?;
    let header_block = std::str::from_utf8(&raw[..split.0]).ok()?;
    let mut headers = HashMap::new();
    for line in header_block.lines() {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    let mut data = raw[split.1..].to_vec();
    while data.ends_with(b"\r\n") || data.ends_with(b"\n") {
        let cut = if data.ends_with(b"\r\n") { 2 } else { 1 };
        data.truncate(data.len() - cut);
    }
    if headers
        .get("content-transfer-encoding")
        .map(|e| e.eq_ignore_ascii_case("base64"))
        .unwrap_or(false)
    {
        let compact: Vec<u8> = data
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        data = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .ok()?;
    }
    Some(MimePart { headers, data })
}

/// Split a multipart body at its boundary markers.
pub fn split_multipart(body: &[u8], boundary: &str) -> Result<Vec<MimePart>> {
    let delim = format!("--{}", boundary).into_bytes();
    let mut marks = Vec::new();
    let mut at = 0;
    while let Some(pos) = find_sub(body, &delim, at) {
        marks.push(pos);
        at = pos + delim.len();
    }
    if marks.len() < 2 {
        return Err(Error::MalformedResponse(
            "multipart body without boundary markers".into(),
        ));
    }
    let mut parts = Vec::new();
    for pair in marks.windows(2) {
        let mut start = pair[0] + delim.len();
        // skip the CRLF that terminates the delimiter line
        while start < pair[1] && (body[start] == b'\r' || body[start] == b'\n') {
            start += 1;
            if body[start - 1] == b'\n' {
                break;
            }
        }
        if let Some(part) = parse_part(&body[start..pair[1]]) {
            parts.push(part);
        }
    }
    if parts.is_empty() {
        return Err(Error::MalformedResponse("multipart with no parsable parts".into()));
    }
    Ok(parts)
}

fn image_part(parts: &[MimePart]) -> Result<&MimePart> {
    parts
        .iter()
        .find(|p| {
            let ct = p.content_type();
            ct.starts_with("image/") || ct.starts_with("application/octet-stream")
        })
        .or_else(|| parts.get(1))
        .ok_or_else(|| Error::MalformedResponse("no image part in multipart reply".into()))
}

fn is_tiff(data: &[u8]) -> bool {
    data.starts_with(b"II*\0") || data.starts_with(b"MM\0*")
}

fn tiff_frame(color: ColorType, result: DecodingResult, w: u32, h: u32) -> Result<DynamicImage> {
    let bad = || Error::MalformedResponse("tiff frame buffer size mismatch".into());
    match (color, result) {
        (ColorType::Gray(8), DecodingResult::U8(v)) => Ok(DynamicImage::ImageLuma8(
            image::GrayImage::from_raw(w, h, v).ok_or_else(bad)?,
        )),
        (ColorType::Gray(16), DecodingResult::U16(v)) => Ok(DynamicImage::ImageLuma16(
            image::ImageBuffer::from_raw(w, h, v).ok_or_else(bad)?,
        )),
        (ColorType::RGB(8), DecodingResult::U8(v)) => Ok(DynamicImage::ImageRgb8(
            image::RgbImage::from_raw(w, h, v).ok_or_else(bad)?,
        )),
        (ColorType::RGB(16), DecodingResult::U16(v)) => Ok(DynamicImage::ImageRgb16(
            image::ImageBuffer::from_raw(w, h, v).ok_or_else(bad)?,
        )),
        (ColorType::RGBA(8), DecodingResult::U8(v)) => Ok(DynamicImage::ImageRgba8(
            image::RgbaImage::from_raw(w, h, v).ok_or_else(bad)?,
        )),
        (color, _) => Err(Error::MalformedResponse(format!(
            "unsupported tiff layout {:?}",
            color
        ))),
    }
}

/// Decode an image payload into one [`DynamicImage`] per frame, in frame
/// order. Single-frame formats yield exactly one image.
pub fn decode_frames(data: &[u8]) -> Result<Vec<DynamicImage>> {
    if is_tiff(data) {
        let mut decoder = Decoder::new(Cursor::new(data))
            .map_err(|e| Error::MalformedResponse(format!("tiff: {}", e)))?;
        let mut frames = Vec::new();
        loop {
            let (w, h) = decoder
                .dimensions()
                .map_err(|e| Error::MalformedResponse(format!("tiff: {}", e)))?;
            let color = decoder
                .colortype()
                .map_err(|e| Error::MalformedResponse(format!("tiff: {}", e)))?;
            let result = decoder
                .read_image()
                .map_err(|e| Error::MalformedResponse(format!("tiff: {}", e)))?;
            frames.push(tiff_frame(color, result, w, h)?);
            if !decoder.more_images() {
                break;
            }
            decoder
                .next_image()
                .map_err(|e| Error::MalformedResponse(format!("tiff: {}", e)))?;
        }
        Ok(frames)
    } else {
        let img = image::load_from_memory(data)
            .map_err(|e| Error::MalformedResponse(format!("image decode: {}", e)))?;
        Ok(vec![img])
    }
}

/// Extract and decode every image frame from a multipart RetrieveImage
/// reply body.
pub fn extract_images(content_type: &str, body: &[u8]) -> Result<Vec<DynamicImage>> {
    let boundary = extract_boundary(content_type).ok_or_else(|| {
        Error::MalformedResponse(format!("no multipart boundary in '{}'", content_type))
    })?;
    let parts = split_multipart(body, &boundary)?;
    let image = image_part(&parts)?;
    decode_frames(&image.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::{colortype, TiffEncoder};

    fn two_page_tiff() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        {
            let mut enc = TiffEncoder::new(&mut out).unwrap();
            let page1 = vec![10u8; 4 * 3];
            let page2 = vec![200u8; 4 * 3];
            enc.write_image::<colortype::Gray8>(4, 3, &page1).unwrap();
            enc.write_image::<colortype::Gray8>(4, 3, &page2).unwrap();
        }
        out.into_inner()
    }

    fn multipart(image: &[u8], image_type: &str) -> (String, Vec<u8>) {
        let boundary = "MIME_boundary_77";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Type: application/soap+xml\r\n\r\n<soap:Envelope/>\r\n--{b}\r\nContent-Type: {t}\r\n\r\n",
                b = boundary,
                t = image_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(image);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        (
            format!("multipart/related; boundary=\"{}\"", boundary),
            body,
        )
    }

    #[test]
    fn test_boundary_extraction() {
        assert_eq!(
            extract_boundary("multipart/related; type=\"application/xop+xml\"; boundary=abc"),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_boundary("multipart/related; boundary=\"quoted\""),
            Some("quoted".to_string())
        );
        assert_eq!(extract_boundary("application/soap+xml"), None);
    }

    #[test]
    fn test_multi_frame_tiff_yields_independent_frames_in_order() {
        let (content_type, body) = multipart(&two_page_tiff(), "image/tiff");
        let frames = extract_images(&content_type, &body).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].width(), 4);
        assert_eq!(frames[0].height(), 3);
        // frame order must match page order
        assert_eq!(frames[0].to_luma8().get_pixel(0, 0).0, [10]);
        assert_eq!(frames[1].to_luma8().get_pixel(0, 0).0, [200]);
    }

    #[test]
    fn test_single_frame_png() {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]));
        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();
        let (content_type, body) = multipart(&png.into_inner(), "image/png");
        let frames = extract_images(&content_type, &body).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].width(), 2);
    }

    #[test]
    fn test_unparsable_multipart_is_fatal() {
        let err = extract_images("multipart/related; boundary=xyz", b"garbage").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[test]
    fn test_base64_part_is_decoded() {
        let payload = base64::engine::general_purpose::STANDARD.encode(b"raw-bytes");
        let boundary = "b1";
        let body = format!(
            "--{b}\r\nContent-Type: application/soap+xml\r\n\r\n<x/>\r\n--{b}\r\nContent-Type: application/octet-stream\r\nContent-Transfer-Encoding: base64\r\n\r\n{p}\r\n--{b}--\r\n",
            b = boundary,
            p = payload
        );
        let parts = split_multipart(body.as_bytes(), boundary).unwrap();
        assert_eq!(parts[1].data, b"raw-bytes");
    }
}
