//! Supported data sources.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tenant identifier.
pub type TenantId = String;

/// External platform a tenant can sync metrics from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Ads platform.
    Meta,
    /// Analytics platform.
    Ga4,
    /// Commerce platform.
    Shopify,
}

impl Service {
    /// Every supported service.
    pub const ALL: [Service; 3] = [Service::Meta, Service::Ga4, Service::Shopify];

    /// Stable identifier used in storage and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Meta => "meta",
            Service::Ga4 => "ga4",
            Service::Shopify => "shopify",
        }
    }

    /// Human readable name for alerts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Service::Meta => "Meta Ads",
            Service::Ga4 => "Google Analytics 4",
            Service::Shopify => "Shopify",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown service name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown service: {0}")]
pub struct UnknownService(pub String);

impl FromStr for Service {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meta" => Ok(Service::Meta),
            "ga4" => Ok(Service::Ga4),
            "shopify" => Ok(Service::Shopify),
            other => Err(UnknownService(other.to_string())),
        }
    }
}
