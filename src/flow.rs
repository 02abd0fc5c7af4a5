//! Production sections and flow policy.
//!
//! A job moves through an ordered list of sections. Part lots use the fixed
//! cutting → cnc_tools flow; product jobs either carry an explicit
//! allowed-section list (always re-ordered to the canonical flow) or derive
//! their flow from the materials BOM: products built on an MDF page skip the
//! sewing/upholstery stages, everything else skips the workpage stage.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// One stage of the production pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Section {
    Cutting,
    CncTools,
    Assembly,
    Workpage,
    Undercoating,
    Painting,
    Sewing,
    Upholstery,
    Packaging,
}

impl Section {
    /// Sections whose stock lives on `Part` rows.
    pub fn is_part_based(self) -> bool {
        matches!(self, Section::Cutting | Section::CncTools)
    }

    /// Sections whose stock lives on `ProductStock` buckets.
    pub fn is_product_based(self) -> bool {
        !self.is_part_based()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Cutting => "cutting",
            Section::CncTools => "cnc_tools",
            Section::Assembly => "assembly",
            Section::Workpage => "workpage",
            Section::Undercoating => "undercoating",
            Section::Painting => "painting",
            Section::Sewing => "sewing",
            Section::Upholstery => "upholstery",
            Section::Packaging => "packaging",
        }
    }

    /// Parse a stored slug, tolerating case and the legacy `cnc` shorthand.
    pub fn parse(slug: &str) -> Option<Section> {
        let s = slug.trim().to_lowercase();
        if s == "cnc" {
            return Some(Section::CncTools);
        }
        s.parse().ok()
    }
}

/// Canonical order of the product-based sections.
pub const PRODUCT_SECTION_ORDER: [Section; 7] = [
    Section::Assembly,
    Section::Workpage,
    Section::Undercoating,
    Section::Painting,
    Section::Sewing,
    Section::Upholstery,
    Section::Packaging,
];

/// Fixed flow for part-only jobs.
pub const PART_SECTION_ORDER: [Section; 2] = [Section::Cutting, Section::CncTools];

/// Every section, in overall pipeline order.
pub const ALL_SECTIONS: [Section; 9] = [
    Section::Cutting,
    Section::CncTools,
    Section::Assembly,
    Section::Workpage,
    Section::Undercoating,
    Section::Painting,
    Section::Sewing,
    Section::Upholstery,
    Section::Packaging,
];

/// Re-order an allowed-section list into the canonical product flow.
///
/// The order the user ticked boxes in is irrelevant; only membership counts.
/// Slugs outside the seven product sections (cutting/cnc_tools show up in
/// stored lists from the job form) are dropped here.
pub fn ordered_allowed_sections(raw: &[String]) -> Vec<Section> {
    let set: std::collections::HashSet<String> =
        raw.iter().map(|s| s.trim().to_lowercase()).collect();
    PRODUCT_SECTION_ORDER
        .iter()
        .copied()
        .filter(|s| set.contains(s.as_str()))
        .collect()
}

/// Inputs the flow policy depends on; everything else on the job is ignored.
#[derive(Debug, Clone, Copy)]
pub struct FlowInputs<'a> {
    pub has_part: bool,
    pub has_product: bool,
    pub allowed_sections: &'a [String],
    /// Whether the product's materials BOM contains an MDF/page material.
    pub has_mdf_page: bool,
}

/// Ordered list of sections the job should traverse.
pub fn flow_for(inputs: FlowInputs<'_>) -> Vec<Section> {
    if inputs.has_part && !inputs.has_product {
        return PART_SECTION_ORDER.to_vec();
    }
    if !inputs.has_product {
        return Vec::new();
    }
    if !inputs.allowed_sections.is_empty() {
        return ordered_allowed_sections(inputs.allowed_sections);
    }
    // No explicit list: derive from the BOM. MDF-page products are finished
    // on the workpage line and never see sewing/upholstery; all others skip
    // the workpage stage.
    PRODUCT_SECTION_ORDER
        .iter()
        .copied()
        .filter(|s| {
            if inputs.has_mdf_page {
                !matches!(s, Section::Sewing | Section::Upholstery)
            } else {
                *s != Section::Workpage
            }
        })
        .collect()
}

/// Default ticks for the job-creation form, covering the whole pipeline.
pub fn default_allowed_sections(has_mdf_page: bool) -> Vec<Section> {
    ALL_SECTIONS
        .iter()
        .copied()
        .filter(|s| {
            if has_mdf_page {
                !matches!(s, Section::Sewing | Section::Upholstery)
            } else {
                *s != Section::Workpage
            }
        })
        .collect()
}

/// Completion predicate for product movements.
///
/// A movement closes the job when it lands on the last allowed section, or
/// unconditionally on packaging. The packaging fallback is redundant with a
/// well-formed allowed list but is load-bearing for jobs with an empty or
/// malformed list, so it stays an explicit OR.
pub fn closes_job(section: Section, allowed_sections: &[String]) -> bool {
    if section == Section::Packaging {
        return true;
    }
    ordered_allowed_sections(allowed_sections)
        .last()
        .is_some_and(|last| *last == section)
}

/// Fold a Persian name into a canonical comparison form: Arabic yeh/kaf to
/// their Persian codepoints, separators (ZWNJ, dash, dot, slash) to spaces,
/// whitespace collapsed.
fn normalize_material_name(value: &str) -> String {
    let text: String = value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'ي' => 'ی',
            'ك' => 'ک',
            '\u{200c}' | '-' | '_' | '.' | '/' | '\\' => ' ',
            other => other,
        })
        .collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the name contains the phrase «صفحه ام‌دی‌اف» in any spelling.
pub fn contains_mdf_page_material(value: &str) -> bool {
    let normalized = normalize_material_name(value);
    if normalized.is_empty() {
        return false;
    }
    let collapsed: String = normalized.chars().filter(|c| *c != ' ').collect();
    collapsed.contains("صفحهامدیاف")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slugs(sections: &[Section]) -> Vec<&'static str> {
        sections.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn part_jobs_have_fixed_two_step_flow() {
        let flow = flow_for(FlowInputs {
            has_part: true,
            has_product: false,
            allowed_sections: &[],
            has_mdf_page: false,
        });
        assert_eq!(slugs(&flow), vec!["cutting", "cnc_tools"]);
    }

    #[test]
    fn allowed_sections_are_reordered_canonically() {
        let allowed = vec![
            "packaging".to_string(),
            "assembly".to_string(),
            "painting".to_string(),
        ];
        let flow = flow_for(FlowInputs {
            has_part: false,
            has_product: true,
            allowed_sections: &allowed,
            has_mdf_page: false,
        });
        assert_eq!(slugs(&flow), vec!["assembly", "painting", "packaging"]);
    }

    #[test]
    fn mdf_products_skip_sewing_and_upholstery() {
        let flow = flow_for(FlowInputs {
            has_part: false,
            has_product: true,
            allowed_sections: &[],
            has_mdf_page: true,
        });
        assert_eq!(
            slugs(&flow),
            vec!["assembly", "workpage", "undercoating", "painting", "packaging"]
        );
    }

    #[test]
    fn non_mdf_products_skip_workpage() {
        let flow = flow_for(FlowInputs {
            has_part: false,
            has_product: true,
            allowed_sections: &[],
            has_mdf_page: false,
        });
        assert_eq!(
            slugs(&flow),
            vec![
                "assembly",
                "undercoating",
                "painting",
                "sewing",
                "upholstery",
                "packaging"
            ]
        );
    }

    #[test]
    fn jobs_without_product_or_part_have_empty_flow() {
        let flow = flow_for(FlowInputs {
            has_part: false,
            has_product: false,
            allowed_sections: &[],
            has_mdf_page: false,
        });
        assert!(flow.is_empty());
    }

    #[test]
    fn flow_derivation_is_deterministic() {
        let allowed = vec!["painting".to_string(), "assembly".to_string()];
        let inputs = FlowInputs {
            has_part: false,
            has_product: true,
            allowed_sections: &allowed,
            has_mdf_page: false,
        };
        assert_eq!(flow_for(inputs), flow_for(inputs));
    }

    #[test]
    fn packaging_always_closes() {
        assert!(closes_job(Section::Packaging, &[]));
        assert!(closes_job(
            Section::Packaging,
            &["assembly".to_string(), "painting".to_string()]
        ));
    }

    #[test]
    fn last_allowed_section_closes() {
        let allowed = vec!["assembly".to_string(), "painting".to_string()];
        assert!(closes_job(Section::Painting, &allowed));
        assert!(!closes_job(Section::Assembly, &allowed));
    }

    #[test]
    fn mdf_matcher_handles_spelling_variants() {
        assert!(contains_mdf_page_material("صفحه ام‌دی‌اف"));
        assert!(contains_mdf_page_material("صفحه ام دی اف سفید"));
        assert!(contains_mdf_page_material("صفحه-ام‌دی‌اف"));
        assert!(!contains_mdf_page_material("ام‌دی‌اف خام"));
        assert!(!contains_mdf_page_material(""));
        assert!(!contains_mdf_page_material("پارچه رویه"));
    }

    #[test]
    fn legacy_cnc_slug_parses() {
        assert_eq!(Section::parse("cnc"), Some(Section::CncTools));
        assert_eq!(Section::parse("CNC_TOOLS"), Some(Section::CncTools));
        assert_eq!(Section::parse("bogus"), None);
    }
}
