//! Advisory quality scores for the narrative sections.
//!
//! Scores are 0–100 heuristics with improvement suggestions. They are shown as
//! hints only: nothing here gates navigation or persistence.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::resume::{ResumeDocument, Skills};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub score: u8,
    pub suggestions: Vec<String>,
}

impl QualityReport {
    fn from_penalties(penalty: i32, suggestions: Vec<String>) -> Self {
        Self {
            score: (100 - penalty).clamp(0, 100) as u8,
            suggestions,
        }
    }

    fn empty(suggestion: &str) -> Self {
        Self {
            score: 0,
            suggestions: vec![suggestion.to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentQuality {
    pub overall: u8,
    pub summary: QualityReport,
    pub experience: QualityReport,
    pub skills: QualityReport,
}

const VAGUE_VERBS: &[&str] = &[
    "improved",
    "enhanced",
    "helped",
    "worked on",
    "assisted",
    "supported",
    "participated",
    "involved",
    "responsible for",
];

const VAGUE_SCALE_WORDS: &[&str] = &[
    "significant",
    "major",
    "large",
    "huge",
    "massive",
    "substantial",
    "many",
    "numerous",
    "various",
    "several",
];

const CLICHES: &[&str] = &[
    "hard-working",
    "hardworking",
    "team player",
    "detail-oriented",
    "go-getter",
    "results-driven",
    "self-starter",
    "synergy",
    "think outside the box",
    "passionate about",
];

const ACTION_VERBS: &[&str] = &[
    "architected", "automated", "built", "cut", "delivered", "designed", "developed",
    "drove", "engineered", "established", "grew", "implemented", "increased", "launched",
    "led", "managed", "mentored", "migrated", "optimized", "owned", "reduced", "redesigned",
    "refactored", "scaled", "shipped", "spearheaded", "streamlined", "created", "introduced",
    "wrote",
];

fn has_metric(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit() || matches!(c, '%' | '$' | '€' | '£'))
}

/// Scores a professional summary paragraph.
pub fn summary_quality(text: &str) -> QualityReport {
    let text = text.trim();
    if text.is_empty() {
        return QualityReport::empty("Add a 2-4 sentence professional summary.");
    }
    let lower = text.to_lowercase();
    let mut penalty = 0;
    let mut suggestions = Vec::new();

    let len = text.chars().count();
    if len < 150 {
        penalty += 30;
        suggestions.push("Expand the summary to at least 150 characters.".to_string());
    } else if len > 800 {
        penalty += 20;
        suggestions.push("Trim the summary below 800 characters.".to_string());
    }

    if !has_metric(text) {
        penalty += 15;
        suggestions.push("Mention a concrete result: years, team size, or a metric.".to_string());
    }

    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();
    if words.iter().any(|w| matches!(*w, "i" | "my" | "me" | "i'm")) {
        penalty += 10;
        suggestions.push("Drop first-person pronouns; write in implied first person.".to_string());
    }

    let cliche_hits: Vec<&str> = CLICHES.iter().copied().filter(|c| lower.contains(c)).collect();
    if !cliche_hits.is_empty() {
        penalty += (10 * cliche_hits.len() as i32).min(30);
        suggestions.push(format!(
            "Replace clichés ({}) with specifics.",
            cliche_hits.join(", ")
        ));
    }

    let sentences = text
        .split(|c: char| matches!(c, '.' | '!' | '?'))
        .filter(|s| !s.trim().is_empty())
        .count();
    if sentences < 2 {
        penalty += 10;
        suggestions.push("Use at least two sentences.".to_string());
    }

    QualityReport::from_penalties(penalty, suggestions)
}

/// Scores a single experience bullet.
pub fn bullet_quality(text: &str) -> QualityReport {
    let text = text.trim();
    if text.is_empty() {
        return QualityReport::empty("Write the bullet.");
    }
    let lower = text.to_lowercase();
    let mut penalty = 0;
    let mut suggestions = Vec::new();

    let first_word = lower
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| !c.is_alphanumeric());
    if !ACTION_VERBS.contains(&first_word) {
        penalty += 20;
        suggestions.push("Start with a strong action verb (Led, Built, Reduced...).".to_string());
    }

    let quantified = has_metric(text);
    if !quantified {
        penalty += 25;
        suggestions.push("Quantify the outcome with a number, percentage, or time saved.".to_string());
    }

    if let Some(vague) = VAGUE_VERBS.iter().find(|v| lower.contains(*v)) {
        penalty += 15;
        suggestions.push(format!("Replace the vague verb '{vague}' with what you actually did."));
    }

    if !quantified {
        if let Some(scale) = VAGUE_SCALE_WORDS.iter().find(|w| {
            lower
                .split_whitespace()
                .any(|token| token.trim_matches(|c: char| !c.is_alphanumeric()) == **w)
        }) {
            penalty += 10;
            suggestions.push(format!("Replace '{scale}' with a specific number."));
        }
    }

    let len = text.chars().count();
    if len < 40 {
        penalty += 15;
        suggestions.push("Add detail: what, how, and the result.".to_string());
    } else if len > 220 {
        penalty += 10;
        suggestions.push("Trim the bullet to about two lines.".to_string());
    }

    QualityReport::from_penalties(penalty, suggestions)
}

/// Averages bullet scores; suggestions are deduplicated and kept in first-seen order.
pub fn experience_quality(bullets: &[String]) -> QualityReport {
    let scored: Vec<QualityReport> = bullets
        .iter()
        .filter(|b| !b.trim().is_empty())
        .map(|b| bullet_quality(b))
        .collect();
    if scored.is_empty() {
        return QualityReport::empty("Add responsibilities and achievements to your experience.");
    }
    let avg = scored.iter().map(|r| r.score as u32).sum::<u32>() / scored.len() as u32;
    let mut suggestions: Vec<String> = Vec::new();
    for s in scored.into_iter().flat_map(|r| r.suggestions) {
        if !suggestions.contains(&s) {
            suggestions.push(s);
        }
    }
    QualityReport {
        score: avg as u8,
        suggestions,
    }
}

pub fn skills_quality(skills: &Skills) -> QualityReport {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for item in skills.values().flatten() {
        *seen.entry(item.trim().to_lowercase()).or_default() += 1;
    }
    if seen.is_empty() {
        return QualityReport::empty("List the skills relevant to the roles you want.");
    }

    let mut penalty = 0;
    let mut suggestions = Vec::new();

    if seen.len() < 5 {
        penalty += 30;
        suggestions.push("List at least 5 skills.".to_string());
    } else if seen.len() > 40 {
        penalty += 20;
        suggestions.push("Keep the list focused: 40 skills or fewer.".to_string());
    }

    let categories = skills.values().filter(|v| !v.is_empty()).count();
    if categories < 2 {
        penalty += 20;
        suggestions.push("Spread skills over at least two categories.".to_string());
    }

    let mut duplicates: Vec<&String> = seen.iter().filter(|(_, n)| **n > 1).map(|(k, _)| k).collect();
    if !duplicates.is_empty() {
        duplicates.sort();
        penalty += (10 * duplicates.len() as i32).min(20);
        suggestions.push(format!(
            "Listed in more than one category: {}.",
            duplicates.iter().map(|d| d.as_str()).collect::<Vec<_>>().join(", ")
        ));
    }

    QualityReport::from_penalties(penalty, suggestions)
}

/// Weighted roll-up: experience 50%, summary 30%, skills 20%.
pub fn document_quality(document: &ResumeDocument) -> DocumentQuality {
    let summary = summary_quality(&document.summary.text);
    let bullets: Vec<String> = document
        .work_experience
        .iter()
        .flat_map(|job| job.responsibilities.iter().cloned())
        .collect();
    let experience = experience_quality(&bullets);
    let skills = skills_quality(&document.skills);

    let overall = (0.5 * experience.score as f64 + 0.3 * summary.score as f64 + 0.2 * skills.score as f64)
        .round()
        .clamp(0.0, 100.0) as u8;

    DocumentQuality {
        overall,
        summary,
        experience,
        skills,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::SkillCategory;

    #[test]
    fn test_strong_bullet_scores_full() {
        let r = bullet_quality("Reduced p99 latency by 40% by introducing a Redis read-through cache");
        assert_eq!(r.score, 100, "{:?}", r.suggestions);
        assert!(r.suggestions.is_empty());
    }

    #[test]
    fn test_vague_bullet_penalized() {
        let r = bullet_quality("Worked on significant improvements to the platform");
        assert!(r.score < 50, "score {}", r.score);
        assert!(r.suggestions.iter().any(|s| s.contains("worked on")));
        assert!(r.suggestions.iter().any(|s| s.contains("significant")));
    }

    #[test]
    fn test_empty_summary_scores_zero() {
        assert_eq!(summary_quality("  ").score, 0);
    }

    #[test]
    fn test_summary_first_person_and_cliche() {
        let r = summary_quality(
            "I am a hard-working team player. My passion is building software that people love to use every day.",
        );
        assert!(r.suggestions.iter().any(|s| s.contains("first-person")));
        assert!(r.suggestions.iter().any(|s| s.contains("clichés")));
        assert!(r.score <= 70);
    }

    #[test]
    fn test_good_summary_scores_high() {
        let r = summary_quality(
            "Backend engineer with 8 years of experience building payment systems in Rust and Go. \
             Led a team of 6 that moved settlement to an event-driven pipeline, cutting reconciliation \
             time from days to minutes.",
        );
        assert!(r.score >= 90, "score {} {:?}", r.score, r.suggestions);
    }

    #[test]
    fn test_skills_duplicates_and_spread() {
        let mut skills = Skills::new();
        skills.insert(
            SkillCategory::Backend,
            vec!["Rust".into(), "Go".into(), "Postgres".into()],
        );
        skills.insert(SkillCategory::Database, vec!["postgres".into()]);
        let r = skills_quality(&skills);
        assert!(r.suggestions.iter().any(|s| s.contains("postgres")));
        assert!(r.suggestions.iter().any(|s| s.contains("at least 5")));
    }

    #[test]
    fn test_document_quality_never_exceeds_100() {
        let doc = ResumeDocument::default();
        let q = document_quality(&doc);
        assert_eq!(q.overall, 0);
        assert_eq!(q.experience.score, 0);
    }
}
