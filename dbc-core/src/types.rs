//! Shared types for dbc-core.
//!
//! These types are used by the persistence layer, the policy evaluator and the
//! HTTP/CLI front ends. Wire names are camelCase; enum values are SCREAMING_CASE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declares a string-backed enum with `as_str`, `Display` and a case-insensitive `FromStr`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

string_enum! {
    /// Masking function applied to a protected column.
    pub enum MaskingType {
        None => "NONE",
        Redact => "REDACT",
        Partial => "PARTIAL",
        Hash => "HASH",
        Nullify => "NULLIFY",
        Shuffle => "SHUFFLE",
        Custom => "CUSTOM",
    }
}

string_enum! {
    /// Sensitivity of a data resource. Declaration order is the sensitivity order.
    #[derive(Default)]
    pub enum Sensitivity {
        Public => "PUBLIC",
        #[default]
        Internal => "INTERNAL",
        Confidential => "CONFIDENTIAL",
        Pii => "PII",
        Critical => "CRITICAL",
    }
}

string_enum! {
    /// Kind of subject a policy or exception is granted to.
    pub enum SubjectType {
        User => "USER",
        Role => "ROLE",
    }
}

string_enum! {
    /// Outcome a matching policy produces.
    #[derive(Default)]
    pub enum PolicyEffect {
        #[default]
        Allow => "ALLOW",
        Deny => "DENY",
    }
}

string_enum! {
    /// Stored lifecycle state of a policy exception.
    pub enum ExceptionStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Revoked => "REVOKED",
    }
}

string_enum! {
    #[derive(Default)]
    pub enum RiskLevel {
        #[default]
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
}

string_enum! {
    #[derive(Default)]
    pub enum ExceptionScope {
        #[default]
        Table => "TABLE",
        Column => "COLUMN",
        Dataset => "DATASET",
    }
}

string_enum! {
    /// Action recorded in the exception audit trail.
    pub enum ExceptionAction {
        Request => "REQUEST",
        Approve => "APPROVE",
        Reject => "REJECT",
        Revoke => "REVOKE",
    }
}

/// Granularity of a resource. Ordering is specificity: `Column` is the most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceLevel {
    /// Policy without a resource; applies everywhere a resource is known.
    Global,
    Database,
    Table,
    Column,
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity Types
// ─────────────────────────────────────────────────────────────────────────────

/// Persisted database connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub id: String,
    pub name: String,
    pub db_type: String,
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub description: String,
    pub uri: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskingPattern {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub masking_type: MaskingType,
    /// JSON text; shape depends on `masking_type`.
    pub masking_args: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A protectable unit: database, table or column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResource {
    pub id: String,
    pub database_id: String,
    pub schema_name: String,
    pub table_name: Option<String>,
    pub column_name: Option<String>,
    #[serde(default)]
    pub sensitivity: Sensitivity,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DataResource {
    pub fn level(&self) -> ResourceLevel {
        match (&self.table_name, &self.column_name) {
            (Some(_), Some(_)) => ResourceLevel::Column,
            (Some(_), None) => ResourceLevel::Table,
            _ => ResourceLevel::Database,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Assignment of a user to a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    pub user_id: String,
    pub role_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAccessPolicy {
    pub id: String,
    pub name: String,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub privilege_code: String,
    #[serde(default)]
    pub effect: PolicyEffect,
    pub resource_id: Option<String>,
    pub masking_policy_id: Option<String>,
    pub environment_condition: Option<String>,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Time-bounded override of standard policy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyException {
    pub id: String,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub resource_id: Option<String>,
    pub override_privilege: String,
    pub scope: ExceptionScope,
    pub purpose: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub risk_level: RiskLevel,
    pub status: ExceptionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionAudit {
    pub id: String,
    pub exception_id: String,
    pub user_id: String,
    pub action: ExceptionAction,
    pub context: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Record of a single access decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessAudit {
    pub id: String,
    pub user_id: String,
    pub privilege: String,
    pub resource_id: Option<String>,
    pub allowed: bool,
    pub policy_id: Option<String>,
    pub exception_id: Option<String>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Input Types (for creating entities)
// ─────────────────────────────────────────────────────────────────────────────

/// Input for creating or replacing a connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewConnection {
    pub name: String,
    pub db_type: String,
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub description: String,
    pub uri: String,
}

/// Input for creating a masking pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMaskingPattern {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub masking_type: MaskingType,
    #[serde(default)]
    pub masking_args: Option<String>,
}

/// Partial update of a masking pattern. Present fields replace stored values;
/// an empty `masking_args` string clears the arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaskingPatternUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub masking_type: Option<MaskingType>,
    pub masking_args: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataResource {
    pub database_id: String,
    pub schema_name: String,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub column_name: Option<String>,
    #[serde(default)]
    pub sensitivity: Sensitivity,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataAccessPolicy {
    pub name: String,
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub privilege_code: String,
    #[serde(default)]
    pub effect: PolicyEffect,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub masking_policy_id: Option<String>,
    #[serde(default)]
    pub environment_condition: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Input for requesting a policy exception
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPolicyException {
    pub subject_type: SubjectType,
    pub subject_id: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    pub override_privilege: String,
    #[serde(default)]
    pub scope: ExceptionScope,
    pub purpose: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccessAudit {
    pub user_id: String,
    pub privilege: String,
    pub resource_id: Option<String>,
    pub allowed: bool,
    pub policy_id: Option<String>,
    pub exception_id: Option<String>,
    pub reason: String,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_enum_round_trip() {
        for t in MaskingType::ALL {
            assert_eq!(t.as_str().parse::<MaskingType>().unwrap(), *t);
        }
        assert_eq!("partial".parse::<MaskingType>().unwrap(), MaskingType::Partial);
        assert!("FULL".parse::<MaskingType>().is_err());
    }

    #[test]
    fn test_sensitivity_ordering() {
        assert!(Sensitivity::Public < Sensitivity::Internal);
        assert!(Sensitivity::Internal < Sensitivity::Confidential);
        assert!(Sensitivity::Confidential < Sensitivity::Pii);
        assert!(Sensitivity::Pii < Sensitivity::Critical);
    }

    #[test]
    fn test_enum_defaults() {
        assert_eq!(Sensitivity::default(), Sensitivity::Internal);
        assert_eq!(PolicyEffect::default(), PolicyEffect::Allow);
        assert_eq!(RiskLevel::default(), RiskLevel::Low);
        assert_eq!(ExceptionScope::default(), ExceptionScope::Table);
    }

    #[test]
    fn test_resource_level_specificity() {
        assert!(ResourceLevel::Column > ResourceLevel::Table);
        assert!(ResourceLevel::Table > ResourceLevel::Database);
        assert!(ResourceLevel::Database > ResourceLevel::Global);
    }

    #[test]
    fn test_enum_serde_uses_wire_names() {
        let json = serde_json::to_string(&ExceptionStatus::Approved).unwrap();
        assert_eq!(json, "\"APPROVED\"");
        let parsed: SubjectType = serde_json::from_str("\"ROLE\"").unwrap();
        assert_eq!(parsed, SubjectType::Role);
    }

    #[test]
    fn test_new_policy_defaults() {
        let policy: NewDataAccessPolicy = serde_json::from_str(
            r#"{"name":"p","subjectType":"USER","subjectId":"u1","privilegeCode":"READ"}"#,
        )
        .unwrap();
        assert!(policy.is_active);
        assert_eq!(policy.effect, PolicyEffect::Allow);
        assert_eq!(policy.priority, 0);
        assert!(policy.resource_id.is_none());
    }
}
