//! Response models for the capability and status endpoints.

use serde::Deserialize;

/// Server version and feature flags from `/ocs/v1.php/cloud/capabilities`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Capabilities {
    /// The `ocs` envelope.
    pub ocs: OcsEnvelope,
}

/// OCS response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcsEnvelope {
    /// Payload of the response.
    pub data: CapabilityData,
}

/// Version block plus advertised capabilities.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapabilityData {
    /// Server version.
    pub version: ServerVersion,
    /// Advertised capabilities; absent on some minimal servers.
    #[serde(default)]
    pub capabilities: CapabilityFlags,
}

/// Server version as reported by the OCS API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerVersion {
    #[serde(default)]
    pub major: u32,
    #[serde(default)]
    pub minor: u32,
    #[serde(default)]
    pub micro: u32,
    /// Human-readable version, e.g. `28.0.4`.
    pub string: String,
    #[serde(default)]
    pub edition: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapabilityFlags {
    #[serde(default)]
    pub files: FileCapabilities,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileCapabilities {
    /// Whether the server supports chunked uploads.
    #[serde(default)]
    pub bigfilechunking: bool,
}

impl Capabilities {
    /// Returns the version string, e.g. `28.0.4`.
    #[must_use]
    pub fn version_string(&self) -> &str {
        &self.ocs.data.version.string
    }

    /// Returns true when the server advertises chunked uploads.
    #[must_use]
    pub fn supports_chunking(&self) -> bool {
        self.ocs.data.capabilities.files.bigfilechunking
    }
}

/// Installation status from the unauthenticated `/status.php` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub maintenance: bool,
    #[serde(default)]
    pub needs_db_upgrade: bool,
    #[serde(default)]
    pub version: String,
    #[serde(default, rename = "versionstring")]
    pub version_string: String,
    #[serde(default)]
    pub edition: String,
    #[serde(default, rename = "productname")]
    pub product_name: String,
}
