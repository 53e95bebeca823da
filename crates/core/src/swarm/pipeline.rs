//! # Phases
//!
//! The closed set of workflow phases, the internal stages each phase manager
//! walks through, and the fixed per-phase wiring.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::skills::roles::Role;
use crate::skills::signals::SignalMarkers;

/// A workflow phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Discovery,
    Research,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Research => "research",
        }
    }

    /// User-facing phase name
    pub fn display_name(&self) -> &'static str {
        match self {
            Phase::Discovery => "需求分析",
            Phase::Research => "市场调研",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of a phase manager within one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStage {
    /// Admission check on a new request
    Admission,
    /// Actor conversation
    Dialogue,
    /// Summary shown, waiting for the user
    ConfirmWait,
    /// Scoring the confirmed artifact
    Audit,
    /// Persisting the accepted artifact
    Archive,
    /// Turn ended
    Done,
}

/// Fixed wiring of one phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseProfile {
    pub phase: Phase,
    /// Dialogue actor
    pub actor: Role,
    /// Author of the manager's own status lines
    pub manager_name: &'static str,
    pub markers: SignalMarkers,
    /// New requests pass the admission check first
    pub requires_admission: bool,
    /// Accepted artifacts are persisted through the Document Auditor
    pub archives: bool,
    /// Document keywords of the artifact this phase builds on
    pub prerequisite_keywords: &'static [&'static str],
    /// Fallback filename stem for archived artifacts
    pub archive_stem: &'static str,
}

impl PhaseProfile {
    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Discovery => Self {
                phase,
                actor: Role::DiscoveryInterviewer,
                manager_name: "Discovery_Phase_Manager",
                markers: SignalMarkers::DISCOVERY,
                requires_admission: true,
                archives: true,
                prerequisite_keywords: &[],
                archive_stem: "PRD",
            },
            Phase::Research => Self {
                phase,
                actor: Role::MarketResearcher,
                manager_name: "Research_Phase_Manager",
                markers: SignalMarkers::RESEARCH,
                requires_admission: false,
                archives: false,
                prerequisite_keywords: &["prd", "discovery"],
                archive_stem: "Research",
            },
        }
    }

    /// Auditor configured for this phase's actor
    pub fn auditor(&self) -> Role {
        Role::QualityAuditor { target: self.phase }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Discovery.to_string(), "discovery");
        assert_eq!(Phase::Research.display_name(), "市场调研");
        assert_eq!(
            serde_json::from_str::<Phase>("\"research\"").unwrap(),
            Phase::Research
        );
        assert!(serde_json::from_str::<Phase>("\"architecture\"").is_err());
    }

    #[test]
    fn test_profiles() {
        let discovery = PhaseProfile::for_phase(Phase::Discovery);
        assert!(discovery.requires_admission);
        assert!(discovery.archives);
        assert_eq!(discovery.actor, Role::DiscoveryInterviewer);
        assert_eq!(discovery.auditor().author(), "Senior_PM_Auditor_for_Discovery_Expert");

        let research = PhaseProfile::for_phase(Phase::Research);
        assert!(!research.requires_admission);
        assert!(!research.archives);
        assert_eq!(research.markers, SignalMarkers::RESEARCH);
    }
}
