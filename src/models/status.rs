//! Enumerated row fields and their allowed transitions
//!
//! Every enum here deserializes from the lowercase strings stored in the
//! remote tables. Status enums that the user can change also carry the
//! forward-only transition table the dashboard is allowed to offer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud or hosting provider of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Gcp,
    Azure,
    #[serde(alias = "digital_ocean")]
    DigitalOcean,
    #[serde(rename = "on-prem", alias = "onprem", alias = "on_prem")]
    OnPrem,
    #[default]
    #[serde(other)]
    Other,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Gcp => "gcp",
            Provider::Azure => "azure",
            Provider::DigitalOcean => "digitalocean",
            Provider::OnPrem => "on-prem",
            Provider::Other => "other",
        }
    }
}

/// Health status reported for a cluster by metric ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    Healthy,
    Warning,
    Critical,
    Offline,
}

impl ClusterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterStatus::Healthy => "healthy",
            ClusterStatus::Warning => "warning",
            ClusterStatus::Critical => "critical",
            ClusterStatus::Offline => "offline",
        }
    }
}

/// Severity shared by incidents, anomalies and security threats
///
/// Variants are ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// All severities, most severe first
    pub fn all_descending() -> &'static [Self] {
        &[
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ]
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Kind of storage right-sizing recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Upsize,
    Downsize,
    Delete,
    Maintain,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::Upsize => "upsize",
            RecommendationType::Downsize => "downsize",
            RecommendationType::Delete => "delete",
            RecommendationType::Maintain => "maintain",
        }
    }

    /// Whether acting on this recommendation saves money
    pub fn is_actionable_saving(&self) -> bool {
        matches!(
            self,
            RecommendationType::Downsize | RecommendationType::Delete
        )
    }
}

/// Review status of a storage recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Pending,
    Accepted,
    Rejected,
    Applied,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Accepted => "accepted",
            RecommendationStatus::Rejected => "rejected",
            RecommendationStatus::Applied => "applied",
        }
    }

    /// Statuses reachable from this one
    pub fn next_statuses(&self) -> &'static [Self] {
        match self {
            RecommendationStatus::Pending => {
                &[RecommendationStatus::Accepted, RecommendationStatus::Rejected]
            }
            RecommendationStatus::Accepted => &[RecommendationStatus::Applied],
            RecommendationStatus::Rejected | RecommendationStatus::Applied => &[],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.next_statuses().contains(&next)
    }
}

/// Investigation status of a security threat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatStatus {
    Active,
    Investigating,
    Mitigated,
    FalsePositive,
}

impl ThreatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatStatus::Active => "active",
            ThreatStatus::Investigating => "investigating",
            ThreatStatus::Mitigated => "mitigated",
            ThreatStatus::FalsePositive => "false_positive",
        }
    }

    /// Statuses reachable from this one
    pub fn next_statuses(&self) -> &'static [Self] {
        match self {
            ThreatStatus::Active => &[
                ThreatStatus::Investigating,
                ThreatStatus::Mitigated,
                ThreatStatus::FalsePositive,
            ],
            ThreatStatus::Investigating => {
                &[ThreatStatus::Mitigated, ThreatStatus::FalsePositive]
            }
            ThreatStatus::Mitigated | ThreatStatus::FalsePositive => &[],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.next_statuses().contains(&next)
    }

    /// Still needs attention
    pub fn is_open(&self) -> bool {
        matches!(self, ThreatStatus::Active | ThreatStatus::Investigating)
    }
}

/// Notification flavour, drives the toast colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

macro_rules! impl_display_via_as_str {
    ($($type:ty),* $(,)?) => {
        $(
            impl fmt::Display for $type {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.as_str())
                }
            }
        )*
    };
}

impl_display_via_as_str!(
    Provider,
    ClusterStatus,
    Severity,
    RecommendationType,
    RecommendationStatus,
    ThreatStatus,
    NotificationKind,
);

/// A status change the dashboard is not allowed to offer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move {entity} from '{from}' to '{to}'")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}
