//! The resume document aggregate: what the wizard edits, the preview renders,
//! and the store persists section by section.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::preview::font_metrics::FontFamily;

// ────────────────────────────────────────────────────────────────────────────
// Dates
// ────────────────────────────────────────────────────────────────────────────

/// A calendar month. Ordered chronologically (year first, then month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthYear {
    pub year: u16,
    pub month: u8,
}

impl MonthYear {
    pub fn new(year: u16, month: u8) -> Option<Self> {
        if (1..=12).contains(&month) && (1900..=2100).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Parses `YYYY-MM` (form input) or `MM/YYYY`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (year, month) = if let Some((y, m)) = raw.split_once('-') {
            (y, m)
        } else if let Some((m, y)) = raw.split_once('/') {
            (y, m)
        } else {
            return None;
        };
        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return None;
        }
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Content sections
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub full_name: String,
    pub job_title: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub github: String,
    pub portfolio: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Summary {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkExperience {
    pub job_title: String,
    pub company: String,
    pub location: String,
    pub start_date: Option<MonthYear>,
    pub end_date: Option<MonthYear>,
    pub currently_working: bool,
    pub responsibilities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub project_name: String,
    pub technologies: Vec<String>,
    pub description: String,
    pub live_url: String,
    pub source_code: String,
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    pub location: String,
    pub graduation_date: Option<MonthYear>,
    pub gpa: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Certification {
    pub certification_name: String,
    pub issuer: String,
    pub issue_date: Option<MonthYear>,
    pub credential_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkillCategory {
    ProgrammingLanguages,
    Frontend,
    Backend,
    Database,
    DevOps,
    Tools,
    Other,
}

impl SkillCategory {
    pub const ALL: [SkillCategory; 7] = [
        SkillCategory::ProgrammingLanguages,
        SkillCategory::Frontend,
        SkillCategory::Backend,
        SkillCategory::Database,
        SkillCategory::DevOps,
        SkillCategory::Tools,
        SkillCategory::Other,
    ];

    /// Form field name, identical to the wire key.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillCategory::ProgrammingLanguages => "programmingLanguages",
            SkillCategory::Frontend => "frontend",
            SkillCategory::Backend => "backend",
            SkillCategory::Database => "database",
            SkillCategory::DevOps => "devOps",
            SkillCategory::Tools => "tools",
            SkillCategory::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SkillCategory::ProgrammingLanguages => "Languages",
            SkillCategory::Frontend => "Frontend",
            SkillCategory::Backend => "Backend",
            SkillCategory::Database => "Databases",
            SkillCategory::DevOps => "DevOps",
            SkillCategory::Tools => "Tools",
            SkillCategory::Other => "Other",
        }
    }
}

pub type Skills = BTreeMap<SkillCategory, Vec<String>>;

// ────────────────────────────────────────────────────────────────────────────
// Section keys, visibility and order
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKey {
    PersonalInfo,
    Summary,
    WorkExperience,
    Projects,
    Skills,
    Education,
    Certifications,
    SectionVisibility,
    SectionOrder,
    Customization,
}

impl SectionKey {
    /// Content sections in their default rendering order.
    pub const CONTENT: [SectionKey; 7] = [
        SectionKey::PersonalInfo,
        SectionKey::Summary,
        SectionKey::WorkExperience,
        SectionKey::Projects,
        SectionKey::Skills,
        SectionKey::Education,
        SectionKey::Certifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::PersonalInfo => "personalInfo",
            SectionKey::Summary => "summary",
            SectionKey::WorkExperience => "workExperience",
            SectionKey::Projects => "projects",
            SectionKey::Skills => "skills",
            SectionKey::Education => "education",
            SectionKey::Certifications => "certifications",
            SectionKey::SectionVisibility => "sectionVisibility",
            SectionKey::SectionOrder => "sectionOrder",
            SectionKey::Customization => "customization",
        }
    }

    pub fn is_content(&self) -> bool {
        Self::CONTENT.contains(self)
    }

    /// Heading printed above the section in the preview.
    pub fn heading(&self) -> &'static str {
        match self {
            SectionKey::PersonalInfo => "Personal Info",
            SectionKey::Summary => "Professional Summary",
            SectionKey::WorkExperience => "Work Experience",
            SectionKey::Projects => "Projects",
            SectionKey::Skills => "Skills",
            SectionKey::Education => "Education",
            SectionKey::Certifications => "Certifications",
            SectionKey::SectionVisibility => "Section Visibility",
            SectionKey::SectionOrder => "Section Order",
            SectionKey::Customization => "Customization",
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            SectionKey::SectionVisibility,
            SectionKey::SectionOrder,
            SectionKey::Customization,
        ]
        .into_iter()
        .chain(Self::CONTENT)
        .find(|k| k.as_str() == s)
        .ok_or_else(|| format!("unknown section '{s}'"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Customization
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScheme {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            primary: "#1f2937".to_string(),
            secondary: "#4b5563".to_string(),
            accent: "#2563eb".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontPair {
    pub heading: FontFamily,
    pub body: FontFamily,
}

impl Default for FontPair {
    fn default() -> Self {
        Self {
            heading: FontFamily::Inter,
            body: FontFamily::Inter,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePosition {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCase {
    Upper,
    Title,
    #[default]
    AsTyped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameStyle {
    pub position: NamePosition,
    pub case: NameCase,
    pub bold: bool,
}

impl Default for NameStyle {
    fn default() -> Self {
        Self {
            position: NamePosition::Center,
            case: NameCase::AsTyped,
            bold: true,
        }
    }
}

impl NameStyle {
    pub fn apply(&self, name: &str) -> String {
        match self.case {
            NameCase::Upper => name.to_uppercase(),
            NameCase::AsTyped => name.to_string(),
            NameCase::Title => name
                .split_whitespace()
                .map(|w| {
                    let mut chars = w.chars();
                    match chars.next() {
                        Some(first) => {
                            first.to_uppercase().collect::<String>()
                                + &chars.as_str().to_lowercase()
                        }
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customization {
    pub colors: ColorScheme,
    pub fonts: FontPair,
    pub name_style: NameStyle,
}

impl Customization {
    /// Rejects colors that are not `#rgb` / `#rrggbb`.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("primary", &self.colors.primary),
            ("secondary", &self.colors.secondary),
            ("accent", &self.colors.accent),
        ] {
            if !is_hex_color(value) {
                return Err(format!("colors.{name} must be a hex color, got '{value}'"));
            }
        }
        Ok(())
    }
}

fn is_hex_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Aggregate root
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumeDocument {
    pub personal_info: PersonalInfo,
    pub summary: Summary,
    pub work_experience: Vec<WorkExperience>,
    pub projects: Vec<Project>,
    pub education: Vec<Education>,
    pub skills: Skills,
    pub certifications: Vec<Certification>,
    pub section_visibility: BTreeMap<SectionKey, bool>,
    pub section_order: Vec<SectionKey>,
    pub customization: Customization,
}

impl Default for ResumeDocument {
    fn default() -> Self {
        let mut doc = Self {
            personal_info: PersonalInfo::default(),
            summary: Summary::default(),
            work_experience: Vec::new(),
            projects: Vec::new(),
            education: Vec::new(),
            skills: Skills::new(),
            certifications: Vec::new(),
            section_visibility: BTreeMap::new(),
            section_order: Vec::new(),
            customization: Customization::default(),
        };
        doc.normalize();
        doc
    }
}

impl ResumeDocument {
    /// Parses a stored JSON document, tolerating missing keys, and normalizes it.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut doc: ResumeDocument = serde_json::from_value(value)?;
        doc.normalize();
        Ok(doc)
    }

    /// Restores the visibility/order invariants: personal info is always visible
    /// and always first, only content sections appear, every content section
    /// appears exactly once.
    pub fn normalize(&mut self) {
        self.section_visibility.retain(|k, _| k.is_content());
        for key in SectionKey::CONTENT {
            self.section_visibility.entry(key).or_insert(true);
        }
        self.section_visibility.insert(SectionKey::PersonalInfo, true);

        let mut seen = HashSet::new();
        let mut order = vec![SectionKey::PersonalInfo];
        seen.insert(SectionKey::PersonalInfo);
        for key in self.section_order.iter().copied() {
            if key.is_content() && seen.insert(key) {
                order.push(key);
            }
        }
        for key in SectionKey::CONTENT {
            if seen.insert(key) {
                order.push(key);
            }
        }
        self.section_order = order;
    }

    pub fn is_visible(&self, key: SectionKey) -> bool {
        key == SectionKey::PersonalInfo || self.section_visibility.get(&key).copied().unwrap_or(true)
    }

    /// Returns false when the key is locked (personal info) or not a content section.
    pub fn set_visibility(&mut self, key: SectionKey, visible: bool) -> bool {
        if !key.is_content() || key == SectionKey::PersonalInfo {
            return false;
        }
        self.section_visibility.insert(key, visible);
        true
    }

    pub fn set_order(&mut self, order: Vec<SectionKey>) {
        self.section_order = order;
        self.normalize();
    }

    /// JSON value of one section, as sent to the persistence store.
    pub fn section_value(&self, key: SectionKey) -> Value {
        let value = match key {
            SectionKey::PersonalInfo => serde_json::to_value(&self.personal_info),
            SectionKey::Summary => serde_json::to_value(&self.summary),
            SectionKey::WorkExperience => serde_json::to_value(&self.work_experience),
            SectionKey::Projects => serde_json::to_value(&self.projects),
            SectionKey::Skills => serde_json::to_value(&self.skills),
            SectionKey::Education => serde_json::to_value(&self.education),
            SectionKey::Certifications => serde_json::to_value(&self.certifications),
            SectionKey::SectionVisibility => serde_json::to_value(&self.section_visibility),
            SectionKey::SectionOrder => serde_json::to_value(&self.section_order),
            SectionKey::Customization => serde_json::to_value(&self.customization),
        };
        value.unwrap_or(Value::Null)
    }

    /// Replaces one section from its JSON value. Invariants are restored afterwards.
    pub fn apply_section(&mut self, key: SectionKey, value: Value) -> Result<(), serde_json::Error> {
        match key {
            SectionKey::PersonalInfo => self.personal_info = serde_json::from_value(value)?,
            SectionKey::Summary => self.summary = serde_json::from_value(value)?,
            SectionKey::WorkExperience => self.work_experience = serde_json::from_value(value)?,
            SectionKey::Projects => self.projects = serde_json::from_value(value)?,
            SectionKey::Skills => self.skills = serde_json::from_value(value)?,
            SectionKey::Education => self.education = serde_json::from_value(value)?,
            SectionKey::Certifications => self.certifications = serde_json::from_value(value)?,
            SectionKey::SectionVisibility => {
                self.section_visibility = serde_json::from_value(value)?
            }
            SectionKey::SectionOrder => self.section_order = serde_json::from_value(value)?,
            SectionKey::Customization => self.customization = serde_json::from_value(value)?,
        }
        self.normalize();
        Ok(())
    }

    /// True if the section has anything worth rendering.
    pub fn has_content(&self, key: SectionKey) -> bool {
        match key {
            SectionKey::PersonalInfo => {
                !self.personal_info.full_name.trim().is_empty()
                    || !self.personal_info.email.trim().is_empty()
            }
            SectionKey::Summary => !self.summary.text.trim().is_empty(),
            SectionKey::WorkExperience => !self.work_experience.is_empty(),
            SectionKey::Projects => !self.projects.is_empty(),
            SectionKey::Skills => self.skills.values().any(|v| !v.is_empty()),
            SectionKey::Education => !self.education.is_empty(),
            SectionKey::Certifications => !self.certifications.is_empty(),
            _ => false,
        }
    }
}

/// Deduplicates case-insensitively, keeping the first spelling and original order.
pub fn dedup_case_insensitive(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .filter(|item| seen.insert(item.trim().to_lowercase()))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Database rows
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub document: Value,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
