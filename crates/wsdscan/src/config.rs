// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 wsdscan contributors

//! Client configuration and scan profiles.
//!
//! Profiles are YAML documents, one per file, living in a profiles
//! directory; every profile registered at startup becomes a selectable scan
//! destination on the device panel.

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Well-known WS-Discovery IPv4 multicast group.
pub const WSD_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
/// Well-known WS-Discovery port.
pub const WSD_PORT: u16 = 3702;

fn default_event_port() -> u16 {
    6666
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_discovery_timeout_secs() -> u64 {
    3
}

/// Process-wide client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Address the event delivery server binds to, and the address devices
    /// are told to push notifications to. Must be reachable from the device.
    pub bind_address: String,
    #[serde(default = "default_event_port")]
    pub event_port: u16,
    /// Per-exchange reply timeout for unicast SOAP calls, seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Probe/resolve reply window, seconds.
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    /// The `wsa:Address` devices push event notifications to.
    pub fn notify_address(&self) -> String {
        format!("http://{}:{}/wsd", self.bind_address, self.event_port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            event_port: default_event_port(),
            timeout_secs: default_timeout_secs(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PaperSize {
    A4,
    A5,
    Letter,
}

impl PaperSize {
    /// Canonical extent in 1/1000 inch, the unit the scan schema uses.
    pub fn extent(self) -> (u32, u32) {
        match self {
            Self::A4 => (8267, 11693),
            Self::A5 => (5847, 8267),
            Self::Letter => (8500, 11000),
        }
    }
}

fn default_quality() -> u8 {
    85
}

fn default_image_format() -> String {
    "jpeg".to_string()
}

fn default_input_src() -> String {
    "ADF".to_string()
}

/// One scan destination: ticket overrides plus output handling.
///
/// `id` doubles as the eventing `client_context`; `name` is the label the
/// device shows on its panel.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanProfile {
    pub id: String,
    pub name: String,
    pub paper_size: PaperSize,
    /// Color mode override (e.g. `RGB24`, `Grayscale8`); device default when
    /// absent.
    #[serde(default)]
    pub color: Option<String>,
    pub resolution: u32,
    /// Wire transfer format override; device default kept when absent.
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default = "default_input_src")]
    pub input_src: String,
    /// Format the saved files are encoded in (`jpeg`, `png`, ...).
    #[serde(default = "default_image_format")]
    pub image_format: String,
    #[serde(default = "default_quality")]
    pub quality: u8,
    pub target_folder: String,
    /// Ask the export collaborator to assemble one PDF instead of loose
    /// image files.
    #[serde(default)]
    pub use_pdf: bool,
}

/// Load every `.yaml` profile in `dir`. Files that fail to parse abort the
/// load; a missing directory yields an empty set.
pub fn load_profiles(dir: &Path) -> Result<Vec<ScanProfile>> {
    let mut profiles = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(profiles),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let raw = std::fs::read_to_string(&path)?;
        let profile: ScanProfile = serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        profiles.push(profile);
    }
    profiles.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PROFILE_YAML: &str = r#"
id: ctx-desk
name: "Desk scans"
paper_size: A4
resolution: 300
target_folder: /tmp/scans
use_pdf: true
"#;

    #[test]
    fn test_profile_defaults() {
        let p: ScanProfile = serde_yaml::from_str(PROFILE_YAML).unwrap();
        assert_eq!(p.id, "ctx-desk");
        assert_eq!(p.paper_size, PaperSize::A4);
        assert_eq!(p.input_src, "ADF");
        assert_eq!(p.image_format, "jpeg");
        assert_eq!(p.quality, 85);
        assert!(p.color.is_none());
        assert!(p.use_pdf);
    }

    #[test]
    fn test_paper_extents() {
        assert_eq!(PaperSize::A4.extent(), (8267, 11693));
        assert_eq!(PaperSize::Letter.extent(), (8500, 11000));
    }

    #[test]
    fn test_load_profiles_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("desk.yaml")).unwrap();
        f.write_all(PROFILE_YAML.as_bytes()).unwrap();
        // non-yaml files are skipped
        std::fs::File::create(dir.path().join("notes.txt")).unwrap();
        let profiles = load_profiles(dir.path()).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "Desk scans");
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let profiles = load_profiles(Path::new("/nonexistent/profiles-xyz")).unwrap();
        assert!(profiles.is_empty());
    }

    #[test]
    fn test_client_config_defaults() {
        let cfg: ClientConfig = serde_yaml::from_str("bind_address: 10.0.0.2").unwrap();
        assert_eq!(cfg.event_port, 6666);
        assert_eq!(cfg.notify_address(), "http://10.0.0.2:6666/wsd");
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
    }
}
