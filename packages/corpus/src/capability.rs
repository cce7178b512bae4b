//! Olympus-Corpus: Capability Definitions
//!
//! The frozen CAP-001..CAP-008 table. Capability ids and their
//! severities are part of the external contract; changing any of them
//! requires a corpus version bump.

use serde::{Deserialize, Serialize};

use crate::rule::{RuleDef, RuleKind, Severity};

/// Closed set of capability classes recognized by the analyzer.
///
/// Each class maps to exactly one rule id and drives a fixed authority
/// graph construction in the power-invariant layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityClass {
    /// CAP-001: reading or harvesting credentials
    CredentialAccess,
    /// CAP-002: executing arbitrary operations
    UnrestrictedExecution,
    /// CAP-003: exporting data in bulk
    BulkDataExport,
    /// CAP-004: raising own privilege level
    PrivilegeElevation,
    /// CAP-005: acting as another principal
    Impersonation,
    /// CAP-006: suppressing logs or audit trails
    AuditEvasion,
    /// CAP-007: authority outliving its session
    InfinitePersistence,
    /// CAP-008: reaching across tenant/domain boundaries
    BoundaryCrossing,
}

impl CapabilityClass {
    /// All classes in rule-id order.
    pub const ALL: [CapabilityClass; 8] = [
        CapabilityClass::CredentialAccess,
        CapabilityClass::UnrestrictedExecution,
        CapabilityClass::BulkDataExport,
        CapabilityClass::PrivilegeElevation,
        CapabilityClass::Impersonation,
        CapabilityClass::AuditEvasion,
        CapabilityClass::InfinitePersistence,
        CapabilityClass::BoundaryCrossing,
    ];

    /// Stable rule id for this class.
    pub fn rule_id(self) -> &'static str {
        match self {
            CapabilityClass::CredentialAccess => "CAP-001",
            CapabilityClass::UnrestrictedExecution => "CAP-002",
            CapabilityClass::BulkDataExport => "CAP-003",
            CapabilityClass::PrivilegeElevation => "CAP-004",
            CapabilityClass::Impersonation => "CAP-005",
            CapabilityClass::AuditEvasion => "CAP-006",
            CapabilityClass::InfinitePersistence => "CAP-007",
            CapabilityClass::BoundaryCrossing => "CAP-008",
        }
    }

    /// Frozen severity for this class.
    pub fn severity(self) -> Severity {
        match self {
            CapabilityClass::CredentialAccess => Severity::High,
            CapabilityClass::UnrestrictedExecution => Severity::Critical,
            CapabilityClass::BulkDataExport => Severity::Med,
            CapabilityClass::PrivilegeElevation => Severity::Critical,
            CapabilityClass::Impersonation => Severity::High,
            CapabilityClass::AuditEvasion => Severity::High,
            CapabilityClass::InfinitePersistence => Severity::Med,
            CapabilityClass::BoundaryCrossing => Severity::High,
        }
    }

    /// Reverse lookup from a rule id.
    pub fn from_rule_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.rule_id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            CapabilityClass::CredentialAccess => "credential-access",
            CapabilityClass::UnrestrictedExecution => "unrestricted-execution",
            CapabilityClass::BulkDataExport => "bulk-data-export",
            CapabilityClass::PrivilegeElevation => "privilege-elevation",
            CapabilityClass::Impersonation => "impersonation",
            CapabilityClass::AuditEvasion => "audit-evasion",
            CapabilityClass::InfinitePersistence => "infinite-persistence",
            CapabilityClass::BoundaryCrossing => "boundary-crossing",
        }
    }
}

/// The built-in capability rule table.
///
/// Patterns match against normalized (lowercased, ASCII-folded) text.
pub fn builtin_capability_defs() -> Vec<RuleDef> {
    fn def(class: CapabilityClass, inclusion: &[&str], exclusion: &[&str]) -> RuleDef {
        RuleDef {
            id: class.rule_id().to_string(),
            kind: RuleKind::Capability,
            name: class.name().to_string(),
            severity: class.severity(),
            inclusion: inclusion.iter().map(|s| s.to_string()).collect(),
            exclusion: exclusion.iter().map(|s| s.to_string()).collect(),
            frozen: true,
        }
    }

    vec![
        def(
            CapabilityClass::CredentialAccess,
            &[
                r"(harvest|collect|steal|read) .*(password|credential|secret)",
                r"(password|credential|api key|secret key)s? (for|of) (all|every|other)",
                r"auth(entication)? tokens? (for|of|from)",
            ],
            &[r"(reset|change|update) my (own )?password"],
        ),
        def(
            CapabilityClass::UnrestrictedExecution,
            &[
                r"execute any (operation|command|action)",
                r"run arbitrary (code|commands?|operations?)",
                r"unrestricted (execution|access to execute)",
                r"(perform|carry out) any action without",
            ],
            &[],
        ),
        def(
            CapabilityClass::BulkDataExport,
            &[
                r"export (all|every|the entire|the whole)",
                r"export .*records",
                r"download .*(database|dataset)",
                r"dump .*(table|collection|data)",
            ],
            &[r"\bmy own\b", r"\bmy (records|data|files|documents)\b"],
        ),
        def(
            CapabilityClass::PrivilegeElevation,
            &[
                r"elevate .*privileges?",
                r"escalate to (admin|root|superuser)",
                r"(grant|give) .*(admin|root) (rights|access)",
                r"become (the )?(admin|administrator|superuser)",
            ],
            &[],
        ),
        def(
            CapabilityClass::Impersonation,
            &[
                r"impersonat(e|ing|ion)",
                r"on behalf of (another|other|all) user",
                r"(act|log in|sign in) as (another|a different) user",
                r"pretend(ing)? to be",
            ],
            &[],
        ),
        def(
            CapabilityClass::AuditEvasion,
            &[
                r"without (logging|audit|a trace|being logged)",
                r"(disable|bypass|suppress) .*(logging|audit)",
                r"no audit trail",
                r"(covertly|leave no trace)",
            ],
            &[],
        ),
        def(
            CapabilityClass::InfinitePersistence,
            &[
                r"persist (after|beyond|across)",
                r"survive (restart|logout|session end)",
                r"(permanent|standing|perpetual) access",
                r"(indefinitely|forever|never expires?)",
            ],
            &[],
        ),
        def(
            CapabilityClass::BoundaryCrossing,
            &[
                r"across (all|every) (domain|tenant|account|workspace)s?",
                r"other users'? (data|records|files|accounts)",
                r"every (account|tenant|user) in",
                r"cross-?tenant",
            ],
            &[r"\bpublic content\b"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Rule, RuleEval};

    fn compiled() -> Vec<Rule> {
        builtin_capability_defs()
            .into_iter()
            .map(|d| Rule::compile(d).unwrap())
            .collect()
    }

    fn hits_for(text: &str) -> Vec<String> {
        compiled()
            .iter()
            .filter_map(|r| match r.evaluate(text) {
                RuleEval::Hit(h) => Some(h.rule_id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_unrestricted_execution_and_audit_evasion() {
        let hits = hits_for("grant permission to execute any operation without logging");
        assert_eq!(hits, vec!["CAP-002", "CAP-006"]);
    }

    #[test]
    fn test_self_scope_export_is_excluded() {
        let hits = hits_for("export my own records for backup");
        assert!(hits.is_empty());
        // The exclusion is visible as a suppressed candidate.
        let cap003 = &compiled()[2];
        assert!(matches!(
            cap003.evaluate("export my own records for backup"),
            RuleEval::Excluded { .. }
        ));
    }

    #[test]
    fn test_culinary_text_matches_nothing() {
        let hits = hits_for("marinate the user preferences in settings sauce");
        assert!(hits.is_empty());
    }

    #[test]
    fn test_rule_id_roundtrip() {
        for class in CapabilityClass::ALL {
            assert_eq!(CapabilityClass::from_rule_id(class.rule_id()), Some(class));
        }
        assert_eq!(CapabilityClass::from_rule_id("CAP-999"), None);
    }

    #[test]
    fn test_severities_are_frozen() {
        assert_eq!(
            CapabilityClass::UnrestrictedExecution.severity(),
            Severity::Critical
        );
        assert_eq!(CapabilityClass::AuditEvasion.severity(), Severity::High);
        assert_eq!(CapabilityClass::BulkDataExport.severity(), Severity::Med);
    }
}
