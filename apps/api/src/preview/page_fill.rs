//! Page fill analysis for the live preview.
//!
//! After font fitting, the page can still be mostly empty (a new resume) or
//! spill onto extra pages (floor size reached). This module classifies the
//! fill of the first page and recommends what the user could change. The
//! result is advisory and shown as a hint next to the preview.

use serde::{Deserialize, Serialize};

use crate::models::resume::{ResumeDocument, SectionKey};

/// Below this fill ratio the page reads as unfinished.
const MIN_COMFORTABLE_FILL: f32 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFillVerdict {
    /// 75–100% of the first page is used.
    Acceptable,
    /// More than a quarter of the page is blank.
    TooMuchWhitespace,
    /// Content needs more than one page even at the floor font size.
    Overflow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageFillAnalysis {
    pub total_lines_used: u16,
    pub line_capacity: u16,
    pub fill_ratio: f32,
    pub whitespace_fraction: f32,
    pub extra_pages: u16,
    pub verdict: PageFillVerdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FillAction {
    NoAction,
    /// Visible sections that are still empty, in render order.
    AddContent { sections: Vec<SectionKey> },
    /// The section taking the most lines; hiding or trimming it helps most.
    TrimSection { section: SectionKey },
}

pub fn analyze_page_fill(total_lines_used: u16, line_capacity: u16, page_count: u16) -> PageFillAnalysis {
    let capacity = line_capacity.max(1);
    let fill_ratio = total_lines_used as f32 / capacity as f32;
    let whitespace_fraction = (1.0_f32 - fill_ratio).max(0.0);
    let extra_pages = page_count.saturating_sub(1);

    let verdict = if extra_pages > 0 || fill_ratio > 1.0 {
        PageFillVerdict::Overflow
    } else if fill_ratio < MIN_COMFORTABLE_FILL {
        PageFillVerdict::TooMuchWhitespace
    } else {
        PageFillVerdict::Acceptable
    };

    PageFillAnalysis {
        total_lines_used,
        line_capacity,
        fill_ratio,
        whitespace_fraction,
        extra_pages,
        verdict,
    }
}

/// `section_lines` holds the measured line count per rendered section.
pub fn recommend_fill_action(
    analysis: &PageFillAnalysis,
    section_lines: &[(SectionKey, u16)],
    document: &ResumeDocument,
) -> FillAction {
    match analysis.verdict {
        PageFillVerdict::Acceptable => FillAction::NoAction,
        PageFillVerdict::TooMuchWhitespace => {
            let sections: Vec<SectionKey> = document
                .section_order
                .iter()
                .copied()
                .filter(|k| document.is_visible(*k) && !document.has_content(*k))
                .collect();
            if sections.is_empty() {
                FillAction::NoAction
            } else {
                FillAction::AddContent { sections }
            }
        }
        PageFillVerdict::Overflow => section_lines
            .iter()
            .filter(|(k, _)| *k != SectionKey::PersonalInfo)
            .max_by_key(|(_, lines)| *lines)
            .map(|(section, _)| FillAction::TrimSection { section: *section })
            .unwrap_or(FillAction::NoAction),
    }
}

/// Short human-readable hint for the preview banner.
pub fn fill_hint(analysis: &PageFillAnalysis, font_size_pt: f32, base_font_pt: f32) -> Option<String> {
    match analysis.verdict {
        PageFillVerdict::Overflow => Some(format!(
            "Content runs onto {} extra page(s) even at {font_size_pt}pt. Hide a section or shorten bullets.",
            analysis.extra_pages.max(1)
        )),
        PageFillVerdict::TooMuchWhitespace => Some(format!(
            "About {:.0}% of the page is empty. Add more detail to fill it out.",
            analysis.whitespace_fraction * 100.0
        )),
        PageFillVerdict::Acceptable if font_size_pt < base_font_pt => Some(format!(
            "Font reduced to {font_size_pt}pt to fit one page."
        )),
        PageFillVerdict::Acceptable => None,
    }
}
