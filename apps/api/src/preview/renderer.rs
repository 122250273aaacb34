//! Live preview renderer.
//!
//! Turns a merged `ResumeDocument` into a paginated layout. The renderer walks
//! the visible sections in the user's order, estimates how many lines each
//! block wraps to, and lowers the body font size step by step until the whole
//! resume fits one page or the floor size is reached. At the floor the content
//! is paginated and the layout is flagged as overflowing.
//!
//! Measurement is pure CPU work over static tables; async callers run it via
//! `tokio::task::spawn_blocking`.

use serde::{Deserialize, Serialize};

use crate::models::resume::{MonthYear, ResumeDocument, SectionKey, SkillCategory};
use crate::preview::font_metrics::{FontFamily, FontMetrics, PageGeometry};
use crate::preview::page_fill::{
    analyze_page_fill, fill_hint, recommend_fill_action, FillAction, PageFillAnalysis,
};

/// Name is set larger than body text; headings slightly larger.
const NAME_SCALE: f32 = 1.8;
const HEADING_SCALE: f32 = 1.2;
const BULLET_INDENT_EM: f32 = 1.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    pub geometry: PageGeometry,
    pub base_font_pt: f32,
    pub min_font_pt: f32,
    pub step_pt: f32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            base_font_pt: 11.0,
            min_font_pt: 8.0,
            step_pt: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Name,
    Contact,
    Heading,
    Line,
    Bullet,
    Spacer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub section: SectionKey,
    pub kind: BlockKind,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaidOutBlock {
    #[serde(flatten)]
    pub block: Block,
    pub lines: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewPage {
    pub number: u16,
    pub lines_used: u16,
    pub blocks: Vec<LaidOutBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewLayout {
    pub font_family: FontFamily,
    pub font_size_pt: f32,
    /// Every size attempted, largest first.
    pub sizes_tried: Vec<f32>,
    pub line_capacity: u16,
    pub total_lines: u16,
    pub fits_one_page: bool,
    pub overflow: bool,
    pub pages: Vec<PreviewPage>,
    pub fill: PageFillAnalysis,
    pub action: FillAction,
    pub hint: Option<String>,
}

/// Renders the document, shrinking the font until it fits one page or hits the floor.
pub fn render(document: &ResumeDocument, config: &PreviewConfig) -> PreviewLayout {
    let family = document.customization.fonts.body;
    let metrics = FontMetrics::for_family(family);
    let blocks = build_blocks(document);

    let step = config.step_pt.max(0.25);
    let floor = config.min_font_pt.min(config.base_font_pt);
    let mut size = config.base_font_pt;
    let mut sizes_tried = Vec::new();

    let (line_counts, capacity) = loop {
        sizes_tried.push(size);
        let width_em = config.geometry.text_width_em(size);
        let capacity = config.geometry.line_capacity(size);
        let counts: Vec<u16> = blocks
            .iter()
            .map(|b| block_lines(b, &metrics, width_em))
            .collect();
        let total: u16 = counts.iter().fold(0u16, |acc, c| acc.saturating_add(*c));

        if total <= capacity || size <= floor {
            break (counts, capacity);
        }
        size = (size - step).max(floor);
    };

    let total_lines = line_counts.iter().fold(0u16, |acc, c| acc.saturating_add(*c));
    let section_lines = lines_per_section(&blocks, &line_counts);
    let pages = paginate(blocks, &line_counts, capacity);
    let page_count = pages.len() as u16;
    let fits_one_page = page_count <= 1 && total_lines <= capacity;

    let fill = analyze_page_fill(total_lines, capacity, page_count);
    let action = recommend_fill_action(&fill, &section_lines, document);
    let hint = fill_hint(&fill, size, config.base_font_pt);

    PreviewLayout {
        font_family: family,
        font_size_pt: size,
        sizes_tried,
        line_capacity: capacity,
        total_lines,
        fits_one_page,
        overflow: !fits_one_page,
        pages,
        fill,
        action,
        hint,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Block construction
// ────────────────────────────────────────────────────────────────────────────

/// Flattens the visible, non-empty sections into printable blocks in section order.
pub fn build_blocks(document: &ResumeDocument) -> Vec<Block> {
    let mut blocks = Vec::new();
    let sections: Vec<SectionKey> = document
        .section_order
        .iter()
        .copied()
        .filter(|k| document.is_visible(*k) && document.has_content(*k))
        .collect();

    for (i, key) in sections.iter().enumerate() {
        let mut push = |kind: BlockKind, text: String| {
            if kind == BlockKind::Spacer || !text.trim().is_empty() {
                blocks.push(Block {
                    section: *key,
                    kind,
                    text,
                });
            }
        };

        match key {
            SectionKey::PersonalInfo => {
                let info = &document.personal_info;
                let style = &document.customization.name_style;
                push(BlockKind::Name, style.apply(info.full_name.trim()));
                push(BlockKind::Line, info.job_title.clone());
                push(
                    BlockKind::Contact,
                    join_nonempty(
                        &[
                            &info.email,
                            &info.phone,
                            &info.location,
                            &info.linkedin,
                            &info.github,
                            &info.portfolio,
                        ],
                        " | ",
                    ),
                );
            }
            SectionKey::Summary => {
                push(BlockKind::Heading, key.heading().to_string());
                push(BlockKind::Line, document.summary.text.clone());
            }
            SectionKey::WorkExperience => {
                push(BlockKind::Heading, key.heading().to_string());
                for job in &document.work_experience {
                    push(
                        BlockKind::Line,
                        join_nonempty(&[&job.job_title, &job.company, &job.location], " | "),
                    );
                    push(
                        BlockKind::Line,
                        format_range(job.start_date, job.end_date, job.currently_working),
                    );
                    for item in &job.responsibilities {
                        push(BlockKind::Bullet, item.clone());
                    }
                }
            }
            SectionKey::Projects => {
                push(BlockKind::Heading, key.heading().to_string());
                for project in &document.projects {
                    let tech = project.technologies.join(", ");
                    push(
                        BlockKind::Line,
                        join_nonempty(&[&project.project_name, &tech], " | "),
                    );
                    push(BlockKind::Line, project.description.clone());
                    for item in &project.highlights {
                        push(BlockKind::Bullet, item.clone());
                    }
                    push(
                        BlockKind::Line,
                        join_nonempty(&[&project.live_url, &project.source_code], " | "),
                    );
                }
            }
            SectionKey::Skills => {
                push(BlockKind::Heading, key.heading().to_string());
                for category in SkillCategory::ALL {
                    if let Some(items) = document.skills.get(&category) {
                        if !items.is_empty() {
                            push(
                                BlockKind::Line,
                                format!("{}: {}", category.label(), items.join(", ")),
                            );
                        }
                    }
                }
            }
            SectionKey::Education => {
                push(BlockKind::Heading, key.heading().to_string());
                for edu in &document.education {
                    push(
                        BlockKind::Line,
                        join_nonempty(&[&edu.degree, &edu.institution], ", "),
                    );
                    let date = edu.graduation_date.map(format_month).unwrap_or_default();
                    let gpa = if edu.gpa.trim().is_empty() {
                        String::new()
                    } else {
                        format!("GPA: {}", edu.gpa.trim())
                    };
                    push(
                        BlockKind::Line,
                        join_nonempty(&[&edu.location, &date, &gpa], " | "),
                    );
                }
            }
            SectionKey::Certifications => {
                push(BlockKind::Heading, key.heading().to_string());
                for cert in &document.certifications {
                    let date = cert.issue_date.map(format_month).unwrap_or_default();
                    push(
                        BlockKind::Line,
                        join_nonempty(&[&cert.certification_name, &cert.issuer, &date], " | "),
                    );
                }
            }
            _ => {}
        }

        if i + 1 < sections.len() {
            push(BlockKind::Spacer, String::new());
        }
    }
    blocks
}

fn block_lines(block: &Block, metrics: &FontMetrics, width_em: f32) -> u16 {
    let scaled = |scale: f32| -> u16 {
        let lines = metrics.wrap_lines(&block.text, width_em / scale);
        (lines as f32 * scale).ceil() as u16
    };
    match block.kind {
        BlockKind::Name => scaled(NAME_SCALE),
        BlockKind::Heading => scaled(HEADING_SCALE),
        BlockKind::Line | BlockKind::Contact => metrics.wrap_lines(&block.text, width_em),
        BlockKind::Bullet => metrics.wrap_lines(&block.text, width_em - BULLET_INDENT_EM),
        BlockKind::Spacer => 1,
    }
}

fn lines_per_section(blocks: &[Block], counts: &[u16]) -> Vec<(SectionKey, u16)> {
    let mut out: Vec<(SectionKey, u16)> = Vec::new();
    for (block, lines) in blocks.iter().zip(counts) {
        match out.last_mut() {
            Some((key, total)) if *key == block.section => *total = total.saturating_add(*lines),
            _ => out.push((block.section, *lines)),
        }
    }
    out
}

/// Fills pages in order. A block never splits; one taller than a page gets a page to itself.
fn paginate(blocks: Vec<Block>, counts: &[u16], capacity: u16) -> Vec<PreviewPage> {
    let mut pages = vec![PreviewPage {
        number: 1,
        lines_used: 0,
        blocks: Vec::new(),
    }];

    for (block, lines) in blocks.into_iter().zip(counts.iter().copied()) {
        let needs_new_page = {
            let page = pages.last().map(|p| (p.lines_used, p.blocks.is_empty()));
            matches!(page, Some((used, false)) if used.saturating_add(lines) > capacity)
        };
        if needs_new_page {
            // A spacer at a page break is dropped rather than carried over.
            if block.kind == BlockKind::Spacer {
                continue;
            }
            let number = pages.len() as u16 + 1;
            pages.push(PreviewPage {
                number,
                lines_used: 0,
                blocks: Vec::new(),
            });
        }
        if let Some(page) = pages.last_mut() {
            page.lines_used = page.lines_used.saturating_add(lines);
            page.blocks.push(LaidOutBlock { block, lines });
        }
    }
    pages
}

// ────────────────────────────────────────────────────────────────────────────
// Formatting helpers
// ────────────────────────────────────────────────────────────────────────────

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn format_month(date: MonthYear) -> String {
    let idx = (date.month.clamp(1, 12) - 1) as usize;
    format!("{} {}", MONTHS[idx], date.year)
}

fn format_range(start: Option<MonthYear>, end: Option<MonthYear>, current: bool) -> String {
    let start = start.map(format_month).unwrap_or_default();
    let end = if current {
        "Present".to_string()
    } else {
        end.map(format_month).unwrap_or_default()
    };
    match (start.is_empty(), end.is_empty()) {
        (true, true) => String::new(),
        (false, true) => start,
        (true, false) => end,
        (false, false) => format!("{start} - {end}"),
    }
}

fn join_nonempty(parts: &[&String], sep: &str) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::{WorkExperience, Project};

    fn named_doc() -> ResumeDocument {
        let mut doc = ResumeDocument::default();
        doc.personal_info.full_name = "Jane Doe".to_string();
        doc.personal_info.job_title = "Engineer".to_string();
        doc.personal_info.email = "jane@x.com".to_string();
        doc
    }

    fn job(bullets: usize) -> WorkExperience {
        WorkExperience {
            job_title: "Senior Engineer".to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            start_date: MonthYear::new(2019, 4),
            end_date: None,
            currently_working: true,
            responsibilities: (0..bullets)
                .map(|i| {
                    format!(
                        "Led migration number {i} of the billing platform to an event-driven \
                         architecture, cutting reconciliation time by 40% across 12 teams"
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_small_document_fits_at_base_size() {
        let layout = render(&named_doc(), &PreviewConfig::default());
        assert_eq!(layout.font_size_pt, 11.0);
        assert_eq!(layout.sizes_tried, vec![11.0]);
        assert!(layout.fits_one_page);
        assert!(!layout.overflow);
        assert_eq!(layout.pages.len(), 1);
    }

    #[test]
    fn test_empty_document_renders_single_empty_page() {
        let layout = render(&ResumeDocument::default(), &PreviewConfig::default());
        assert_eq!(layout.pages.len(), 1);
        assert_eq!(layout.total_lines, 0);
        assert!(layout.fits_one_page);
    }

    #[test]
    fn test_personal_info_renders_first() {
        let mut doc = named_doc();
        doc.summary.text = "Backend engineer.".to_string();
        doc.set_order(vec![SectionKey::Summary]);
        let blocks = build_blocks(&doc);
        assert_eq!(blocks[0].kind, BlockKind::Name);
        assert_eq!(blocks[0].section, SectionKey::PersonalInfo);
    }

    #[test]
    fn test_hidden_section_is_skipped() {
        let mut doc = named_doc();
        doc.summary.text = "Backend engineer.".to_string();
        doc.set_visibility(SectionKey::Summary, false);
        let blocks = build_blocks(&doc);
        assert!(blocks.iter().all(|b| b.section != SectionKey::Summary));
    }

    #[test]
    fn test_section_order_is_respected() {
        let mut doc = named_doc();
        doc.work_experience.push(job(1));
        doc.skills
            .insert(SkillCategory::Backend, vec!["Rust".to_string()]);
        doc.set_order(vec![
            SectionKey::PersonalInfo,
            SectionKey::Skills,
            SectionKey::WorkExperience,
        ]);
        let headings: Vec<SectionKey> = build_blocks(&doc)
            .into_iter()
            .filter(|b| b.kind == BlockKind::Heading)
            .map(|b| b.section)
            .collect();
        assert_eq!(headings, vec![SectionKey::Skills, SectionKey::WorkExperience]);
    }

    #[test]
    fn test_dense_document_shrinks_font_monotonically() {
        let mut doc = named_doc();
        for _ in 0..4 {
            doc.work_experience.push(job(5));
        }
        let layout = render(&doc, &PreviewConfig::default());
        assert!(layout.font_size_pt < 11.0, "expected reduction");
        assert!(layout.sizes_tried.windows(2).all(|w| w[1] < w[0]));
        assert!(layout.font_size_pt >= 8.0);
    }

    #[test]
    fn test_overflowing_document_paginates_at_floor() {
        let mut doc = named_doc();
        for _ in 0..10 {
            doc.work_experience.push(job(8));
        }
        for i in 0..8 {
            doc.projects.push(Project {
                project_name: format!("Project {i}"),
                description: "A long description of a distributed system ".repeat(4),
                highlights: vec!["Shipped to production for 2M users".to_string(); 5],
                ..Project::default()
            });
        }
        let layout = render(&doc, &PreviewConfig::default());
        assert_eq!(layout.font_size_pt, 8.0);
        assert!(layout.overflow);
        assert!(layout.pages.len() > 1);
        assert!(layout
            .pages
            .iter()
            .all(|p| p.lines_used <= layout.line_capacity || p.blocks.len() == 1));
        assert!(matches!(layout.action, FillAction::TrimSection { .. }));
    }

    #[test]
    fn test_format_range_current_role() {
        assert_eq!(
            format_range(MonthYear::new(2020, 1), None, true),
            "Jan 2020 - Present"
        );
        assert_eq!(format_range(None, None, false), "");
    }
}
