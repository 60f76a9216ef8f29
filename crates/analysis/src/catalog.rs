//! Fixed prompt-fragment keys and the comprehensive section catalogue.
//!
//! These keys are a deploy-time contract: every one of them must exist in
//! the configured fragment source (`planlens doctor` checks this).

use serde::Serialize;

/// Persona prepended to selected analyses.
pub const SELECTED_PERSONA: &str = "persona_selected_analysis.txt";
/// System persona for the comprehensive conversation.
pub const SYSTEM_PERSONA: &str = "persona_system.txt";
/// First turn of the comprehensive conversation.
pub const INITIAL_ANALYSIS: &str = "initial_analysis.txt";
/// Re-prompt sent when a response carries a failure sentinel.
pub const FAILURE_CORRECTIVE: &str = "failure_corrective_action.txt";
pub const REBUTTAL: &str = "rebuttal.txt";
pub const REVISION: &str = "revision.txt";
/// System prompt for plain (document-free) chat threads.
pub const GENERIC_CHAT: &str = "generic_chat.txt";
pub const SUMMARIZE: &str = "summarize_conversation.txt";

/// One step of the comprehensive analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionSpec {
    /// 1-based position in the report
    pub index: u8,
    pub key: &'static str,
    pub title: &'static str,
}

const fn section(index: u8, key: &'static str, title: &'static str) -> SectionSpec {
    SectionSpec { index, key, title }
}

/// The comprehensive report, one section per construction domain, in order.
pub const SECTIONS: [SectionSpec; 21] = [
    section(1, "section_01_site_logistics.txt", "Site Setup & Logistics"),
    section(2, "section_02_demolition.txt", "Demolition & Strip-Out"),
    section(3, "section_03_groundworks_foundations.txt", "Groundworks & Foundations"),
    section(4, "section_04_drainage.txt", "Drainage"),
    section(5, "section_05_structural_framing.txt", "Structural Framing"),
    section(6, "section_06_masonry.txt", "Masonry"),
    section(7, "section_07_roofing.txt", "Roofing"),
    section(8, "section_08_windows_doors.txt", "Windows & External Doors"),
    section(9, "section_09_external_envelope.txt", "External Envelope & Cladding"),
    section(10, "section_10_insulation.txt", "Insulation & Thermal Performance"),
    section(11, "section_11_plumbing.txt", "Plumbing"),
    section(12, "section_12_electrical.txt", "Electrical"),
    section(13, "section_13_hvac.txt", "Heating, Ventilation & Air Conditioning"),
    section(14, "section_14_fire_safety.txt", "Fire Safety"),
    section(15, "section_15_partitions_plastering.txt", "Internal Partitions & Plastering"),
    section(16, "section_16_flooring.txt", "Flooring"),
    section(17, "section_17_joinery_finishes.txt", "Joinery & Finishes"),
    section(18, "section_18_kitchens_bathrooms.txt", "Kitchens & Bathrooms"),
    section(19, "section_19_decoration.txt", "Decoration"),
    section(20, "section_20_external_works.txt", "External Works & Landscaping"),
    section(21, "section_21_compliance_signoff.txt", "Compliance & Sign-Off"),
];

/// Every fragment key the runtime can request.
pub fn required_keys() -> Vec<&'static str> {
    let mut keys = vec![
        SELECTED_PERSONA,
        SYSTEM_PERSONA,
        INITIAL_ANALYSIS,
        FAILURE_CORRECTIVE,
        REBUTTAL,
        REVISION,
        GENERIC_CHAT,
        SUMMARIZE,
    ];
    keys.extend(SECTIONS.iter().map(|s| s.key));
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sections_are_numbered_in_order() {
        for (i, section) in SECTIONS.iter().enumerate() {
            assert_eq!(section.index as usize, i + 1);
            assert!(section.key.starts_with(&format!("section_{:02}_", i + 1)));
        }
    }

    #[test]
    fn keys_are_unique() {
        let keys = required_keys();
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
        assert_eq!(keys.len(), 8 + 21);
    }
}
