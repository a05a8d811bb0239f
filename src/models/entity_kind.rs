//! Entity kind definitions
//!
//! Centralized enum for every entity type the dashboard keeps in its cache.
//! This eliminates hardcoded table names throughout the codebase.

use std::fmt;
use std::str::FromStr;

/// Enumeration of all entity types mirrored from the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Cluster,
    Incident,
    Anomaly,
    StorageRecommendation,
    SecurityThreat,
    Notification,
}

impl EntityKind {
    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Cluster => "Cluster",
            EntityKind::Incident => "Incident",
            EntityKind::Anomaly => "Anomaly",
            EntityKind::StorageRecommendation => "StorageRecommendation",
            EntityKind::SecurityThreat => "SecurityThreat",
            EntityKind::Notification => "Notification",
        }
    }

    /// Remote table backing this entity type
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Cluster => "clusters",
            EntityKind::Incident => "incidents",
            EntityKind::Anomaly => "anomalies",
            EntityKind::StorageRecommendation => "storage_recommendations",
            EntityKind::SecurityThreat => "security_threats",
            EntityKind::Notification => "notifications",
        }
    }

    /// Column used to order bulk queries (newest first)
    pub fn order_column(&self) -> &'static str {
        match self {
            EntityKind::Anomaly | EntityKind::SecurityThreat => "detected_at",
            _ => "created_at",
        }
    }

    /// Whether rows of this kind belong to a single cluster
    ///
    /// Cluster-scoped kinds are subscribed per selected cluster; the others
    /// are subscribed once per signed-in user.
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(
            self,
            EntityKind::Incident
                | EntityKind::Anomaly
                | EntityKind::StorageRecommendation
                | EntityKind::SecurityThreat
        )
    }

    /// Try to parse a string into an EntityKind, returning None if invalid
    pub fn parse_optional(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    /// Look an entity kind up by its remote table name
    pub fn from_table(table: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.table() == table)
    }

    /// Get all entity kinds
    pub fn all() -> &'static [Self] {
        &[
            EntityKind::Cluster,
            EntityKind::Incident,
            EntityKind::Anomaly,
            EntityKind::StorageRecommendation,
            EntityKind::SecurityThreat,
            EntityKind::Notification,
        ]
    }

    /// Kinds subscribed for the currently selected cluster
    pub fn cluster_scoped() -> &'static [Self] {
        &[
            EntityKind::Incident,
            EntityKind::Anomaly,
            EntityKind::StorageRecommendation,
            EntityKind::SecurityThreat,
        ]
    }

    /// Kinds subscribed for the signed-in user
    pub fn user_scoped() -> &'static [Self] {
        &[EntityKind::Cluster, EntityKind::Notification]
    }

    /// Try to parse a string (case-insensitive, with aliases) into an EntityKind
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cluster" | "clusters" => Some(EntityKind::Cluster),
            "incident" | "incidents" | "inc" => Some(EntityKind::Incident),
            "anomaly" | "anomalies" => Some(EntityKind::Anomaly),
            "storagerecommendation" | "storage_recommendations" | "storage" | "pvc" => {
                Some(EntityKind::StorageRecommendation)
            }
            "securitythreat" | "security_threats" | "security" | "threats" => {
                Some(EntityKind::SecurityThreat)
            }
            "notification" | "notifications" => Some(EntityKind::Notification),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Cluster" => Ok(EntityKind::Cluster),
            "Incident" => Ok(EntityKind::Incident),
            "Anomaly" => Ok(EntityKind::Anomaly),
            "StorageRecommendation" => Ok(EntityKind::StorageRecommendation),
            "SecurityThreat" => Ok(EntityKind::SecurityThreat),
            "Notification" => Ok(EntityKind::Notification),
            _ => Err(format!("Unknown entity kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(EntityKind::Cluster.table(), "clusters");
        assert_eq!(
            EntityKind::StorageRecommendation.table(),
            "storage_recommendations"
        );
        assert_eq!(
            EntityKind::from_table("security_threats"),
            Some(EntityKind::SecurityThreat)
        );
        assert_eq!(EntityKind::from_table("cluster_metrics"), None);
    }

    #[test]
    fn test_scopes_partition_all_kinds() {
        let mut scoped: Vec<EntityKind> = EntityKind::cluster_scoped().to_vec();
        scoped.extend_from_slice(EntityKind::user_scoped());
        scoped.sort();
        let mut all = EntityKind::all().to_vec();
        all.sort();
        assert_eq!(scoped, all);

        for kind in EntityKind::cluster_scoped() {
            assert!(kind.is_cluster_scoped());
        }
        for kind in EntityKind::user_scoped() {
            assert!(!kind.is_cluster_scoped());
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            EntityKind::parse_optional("Incident"),
            Some(EntityKind::Incident)
        );
        assert_eq!(EntityKind::parse_optional("incident"), None);
        assert_eq!(
            EntityKind::from_str_case_insensitive("threats"),
            Some(EntityKind::SecurityThreat)
        );
        assert_eq!(
            EntityKind::from_str_case_insensitive("PVC"),
            Some(EntityKind::StorageRecommendation)
        );
    }

    #[test]
    fn test_into_string() {
        let s: String = EntityKind::Anomaly.into();
        assert_eq!(s, "Anomaly");
        assert_eq!(format!("{}", EntityKind::Notification), "Notification");
    }
}
