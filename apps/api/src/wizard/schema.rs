//! Field schemas for each wizard step, entry caps, and the mapping between
//! form state and the document slice each step owns.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::errors::WizardError;
use crate::models::resume::{
    dedup_case_insensitive, Certification, Education, MonthYear, PersonalInfo, Project,
    ResumeDocument, SectionKey, SkillCategory, Summary, WorkExperience,
};
use crate::wizard::form::{CrossCheck, FieldIssue, FieldKind, FieldSpec, FieldValue, FormSchema, FormState, FormView};
use crate::wizard::navigator::Step;
use crate::wizard::rules::Rule;

// ────────────────────────────────────────────────────────────────────────────
// Caps
// ────────────────────────────────────────────────────────────────────────────

pub const MAX_WORK_ENTRIES: usize = 10;
pub const MAX_RESPONSIBILITIES: usize = 8;
pub const MAX_PROJECTS: usize = 8;
pub const MAX_HIGHLIGHTS: usize = 5;
pub const MAX_TECHNOLOGIES: usize = 15;
pub const MAX_EDUCATION: usize = 5;
pub const MAX_CERTIFICATIONS: usize = 10;
pub const MAX_SKILLS_PER_CATEGORY: usize = 20;

/// Entry cap for list steps; `None` for single-form steps.
pub fn max_entries(step: Step) -> Option<usize> {
    match step {
        Step::WorkExperience => Some(MAX_WORK_ENTRIES),
        Step::Projects => Some(MAX_PROJECTS),
        Step::Education => Some(MAX_EDUCATION),
        Step::Certifications => Some(MAX_CERTIFICATIONS),
        _ => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Schemas
// ────────────────────────────────────────────────────────────────────────────

fn personal_info_schema() -> FormSchema {
    FormSchema {
        fields: vec![
            FieldSpec::new("fullName", "Full name", FieldKind::Name)
                .rule(Rule::required_with("Please enter your full name"))
                .rule(Rule::len_between(2, 100))
                .rule(Rule::custom("Full name must contain letters", |v| {
                    v.chars().any(char::is_alphabetic)
                })),
            FieldSpec::new("jobTitle", "Job title", FieldKind::Name)
                .rule(Rule::required())
                .rule(Rule::len_between(2, 100)),
            FieldSpec::new("email", "Email", FieldKind::Text)
                .rule(Rule::required())
                .rule(Rule::Email),
            FieldSpec::new("phone", "Phone", FieldKind::Text)
                .rule(Rule::required())
                .rule(Rule::phone()),
            FieldSpec::new("location", "Location", FieldKind::Text).rule(Rule::max_len(100)),
            FieldSpec::new("linkedin", "LinkedIn", FieldKind::Text).rule(Rule::Url),
            FieldSpec::new("github", "GitHub", FieldKind::Text).rule(Rule::Url),
            FieldSpec::new("portfolio", "Portfolio", FieldKind::Text).rule(Rule::Url),
        ],
        ..FormSchema::default()
    }
}

fn summary_schema() -> FormSchema {
    FormSchema {
        fields: vec![FieldSpec::new("text", "Summary", FieldKind::Multiline).rule(Rule::max_len(1000))],
        ..FormSchema::default()
    }
}

fn work_experience_schema() -> FormSchema {
    FormSchema {
        fields: vec![
            FieldSpec::new("jobTitle", "Job title", FieldKind::Name).rule(Rule::required()),
            FieldSpec::new("company", "Company", FieldKind::Name).rule(Rule::required()),
            FieldSpec::new("location", "Location", FieldKind::Text).rule(Rule::max_len(100)),
            FieldSpec::new("startDate", "Start date", FieldKind::Text)
                .rule(Rule::required())
                .rule(Rule::MonthYear),
            FieldSpec::new("endDate", "End date", FieldKind::Text).rule(Rule::MonthYear),
            FieldSpec::new("currentlyWorking", "Currently working here", FieldKind::Flag),
            FieldSpec::new(
                "responsibilities",
                "Responsibility",
                FieldKind::List {
                    max_items: MAX_RESPONSIBILITIES,
                },
            )
            .rule(Rule::max_len(300)),
        ],
        checks: vec![
            CrossCheck::RequiredUnless {
                field: "endDate",
                flag: "currentlyWorking",
            },
            CrossCheck::DateOrder {
                start: "startDate",
                end: "endDate",
                unless: "currentlyWorking",
            },
        ],
        identity: vec!["jobTitle", "company"],
    }
}

fn project_schema() -> FormSchema {
    FormSchema {
        fields: vec![
            FieldSpec::new("projectName", "Project name", FieldKind::Name).rule(Rule::required()),
            FieldSpec::new(
                "technologies",
                "Technology",
                FieldKind::List {
                    max_items: MAX_TECHNOLOGIES,
                },
            )
            .rule(Rule::max_len(50)),
            FieldSpec::new("description", "Description", FieldKind::Multiline).rule(Rule::max_len(500)),
            FieldSpec::new("liveUrl", "Live URL", FieldKind::Text).rule(Rule::Url),
            FieldSpec::new("sourceCode", "Source code", FieldKind::Text).rule(Rule::Url),
            FieldSpec::new(
                "highlights",
                "Highlight",
                FieldKind::List {
                    max_items: MAX_HIGHLIGHTS,
                },
            )
            .rule(Rule::max_len(300)),
        ],
        identity: vec!["projectName"],
        ..FormSchema::default()
    }
}

fn education_schema() -> FormSchema {
    FormSchema {
        fields: vec![
            FieldSpec::new("degree", "Degree", FieldKind::Name).rule(Rule::required()),
            FieldSpec::new("institution", "Institution", FieldKind::Name).rule(Rule::required()),
            FieldSpec::new("location", "Location", FieldKind::Text).rule(Rule::max_len(100)),
            FieldSpec::new("graduationDate", "Graduation date", FieldKind::Text).rule(Rule::MonthYear),
            FieldSpec::new("gpa", "GPA", FieldKind::Text).rule(Rule::max_len(10)),
        ],
        identity: vec!["degree", "institution"],
        ..FormSchema::default()
    }
}

fn certification_schema() -> FormSchema {
    FormSchema {
        fields: vec![
            FieldSpec::new("certificationName", "Certification name", FieldKind::Name).rule(Rule::required()),
            FieldSpec::new("issuer", "Issuer", FieldKind::Name).rule(Rule::required()),
            FieldSpec::new("issueDate", "Issue date", FieldKind::Text).rule(Rule::MonthYear),
            FieldSpec::new("credentialUrl", "Credential URL", FieldKind::Text).rule(Rule::Url),
        ],
        identity: vec!["certificationName"],
        ..FormSchema::default()
    }
}

fn skills_schema() -> FormSchema {
    FormSchema {
        fields: SkillCategory::ALL
            .iter()
            .map(|c| {
                FieldSpec::new(
                    c.as_str(),
                    c.label(),
                    FieldKind::List {
                        max_items: MAX_SKILLS_PER_CATEGORY,
                    },
                )
                .rule(Rule::max_len(50))
            })
            .collect(),
        ..FormSchema::default()
    }
}

/// The shared schema for a step; `None` for Finalize.
pub fn schema_for(step: Step) -> Option<Arc<FormSchema>> {
    static SCHEMAS: OnceLock<HashMap<Step, Arc<FormSchema>>> = OnceLock::new();
    SCHEMAS
        .get_or_init(|| {
            HashMap::from([
                (Step::PersonalInfo, Arc::new(personal_info_schema())),
                (Step::Summary, Arc::new(summary_schema())),
                (Step::WorkExperience, Arc::new(work_experience_schema())),
                (Step::Projects, Arc::new(project_schema())),
                (Step::Skills, Arc::new(skills_schema())),
                (Step::Education, Arc::new(education_schema())),
                (Step::Certifications, Arc::new(certification_schema())),
            ])
        })
        .get(&step)
        .cloned()
}

// ────────────────────────────────────────────────────────────────────────────
// Step data
// ────────────────────────────────────────────────────────────────────────────

/// A list step: one form per entry, capped at `max`.
#[derive(Debug, Clone)]
pub struct EntryList {
    schema: Arc<FormSchema>,
    max: usize,
    section: SectionKey,
    entries: Vec<FormState>,
}

impl EntryList {
    /// Appends a blank entry and returns its index.
    pub fn add(&mut self) -> Result<usize, WizardError> {
        if self.entries.len() >= self.max {
            return Err(WizardError::EntryLimit {
                section: self.section,
                max: self.max,
            });
        }
        self.entries.push(FormState::new(self.schema.clone()));
        Ok(self.entries.len() - 1)
    }

    pub fn remove(&mut self, index: usize) -> Result<(), WizardError> {
        self.check_index(index)?;
        self.entries.remove(index);
        Ok(())
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut FormState, WizardError> {
        self.check_index(index)?;
        Ok(&mut self.entries[index])
    }

    /// Entries with at least one identity field filled in.
    pub fn filled(&self) -> impl Iterator<Item = &FormState> {
        self.entries.iter().filter(|e| !e.is_empty())
    }

    fn check_index(&self, index: usize) -> Result<(), WizardError> {
        if index >= self.entries.len() {
            return Err(WizardError::EntryIndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum StepData {
    Form(FormState),
    Entries(EntryList),
}

/// An outstanding problem on a step. `entry` is 1-based for list steps.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepIssue {
    pub step: Step,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<usize>,
    #[serde(flatten)]
    pub issue: FieldIssue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StepView {
    Form {
        form: FormView,
    },
    Entries {
        entries: Vec<FormView>,
        max: usize,
        valid: bool,
    },
}

impl StepData {
    /// Loads the step's slice of `doc` into form state. `None` for Finalize.
    pub fn load(step: Step, doc: &ResumeDocument) -> Option<StepData> {
        let schema = schema_for(step)?;
        let single = |values| Some(StepData::Form(FormState::with_values(schema.clone(), values)));
        let many = |section, rows: Vec<BTreeMap<String, FieldValue>>| {
            let max = max_entries(step).unwrap_or(usize::MAX);
            let entries = rows
                .into_iter()
                .take(max)
                .map(|values| FormState::with_values(schema.clone(), values))
                .collect();
            Some(StepData::Entries(EntryList {
                schema: schema.clone(),
                max,
                section,
                entries,
            }))
        };

        match step {
            Step::PersonalInfo => single(personal_info_values(&doc.personal_info)),
            Step::Summary => single(BTreeMap::from([text("text", &doc.summary.text)])),
            Step::Skills => single(
                SkillCategory::ALL
                    .iter()
                    .map(|c| {
                        let items = doc.skills.get(c).cloned().unwrap_or_default();
                        (c.as_str().to_string(), FieldValue::List(items))
                    })
                    .collect(),
            ),
            Step::WorkExperience => many(
                SectionKey::WorkExperience,
                doc.work_experience.iter().map(work_values).collect(),
            ),
            Step::Projects => many(SectionKey::Projects, doc.projects.iter().map(project_values).collect()),
            Step::Education => many(
                SectionKey::Education,
                doc.education.iter().map(education_values).collect(),
            ),
            Step::Certifications => many(
                SectionKey::Certifications,
                doc.certifications.iter().map(certification_values).collect(),
            ),
            Step::Finalize => None,
        }
    }

    /// Single-form steps are valid when the form is; list steps when every
    /// filled-in entry is (zero entries is fine).
    pub fn is_valid(&self) -> bool {
        match self {
            StepData::Form(form) => form.is_step_valid(),
            StepData::Entries(list) => list.filled().all(FormState::is_step_valid),
        }
    }

    /// Surfaces every error at once. Blank list entries are left alone.
    pub fn touch_all(&mut self) {
        match self {
            StepData::Form(form) => form.touch_all(),
            StepData::Entries(list) => list
                .entries
                .iter_mut()
                .filter(|e| !e.is_empty())
                .for_each(FormState::touch_all),
        }
    }

    pub fn issues(&self, step: Step) -> Vec<StepIssue> {
        match self {
            StepData::Form(form) => form
                .issues()
                .into_iter()
                .map(|issue| StepIssue {
                    step,
                    entry: None,
                    issue,
                })
                .collect(),
            StepData::Entries(list) => list
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| !e.is_empty())
                .flat_map(|(i, e)| {
                    e.issues().into_iter().map(move |issue| StepIssue {
                        step,
                        entry: Some(i + 1),
                        issue,
                    })
                })
                .collect(),
        }
    }

    /// The form a field edit targets. Single-form steps take no index; list
    /// steps require one.
    pub fn form_mut(&mut self, step: Step, entry: Option<usize>) -> Result<&mut FormState, WizardError> {
        match (self, entry) {
            (StepData::Form(form), None) => Ok(form),
            (StepData::Form(_), Some(_)) => Err(WizardError::NotAnEntryStep { step }),
            (StepData::Entries(_), None) => Err(WizardError::EntryIndexRequired { step }),
            (StepData::Entries(list), Some(index)) => list.get_mut(index),
        }
    }

    pub fn entries_mut(&mut self, step: Step) -> Result<&mut EntryList, WizardError> {
        match self {
            StepData::Entries(list) => Ok(list),
            StepData::Form(_) => Err(WizardError::NotAnEntryStep { step }),
        }
    }

    pub fn view(&self) -> StepView {
        match self {
            StepData::Form(form) => StepView::Form { form: form.view() },
            StepData::Entries(list) => StepView::Entries {
                entries: list.entries.iter().map(FormState::view).collect(),
                max: list.max,
                valid: self.is_valid(),
            },
        }
    }

    /// Writes this step's slice into `doc`. Blank entries are dropped and
    /// set-like lists are deduplicated.
    pub fn write_into(&self, step: Step, doc: &mut ResumeDocument) {
        match (step, self) {
            (Step::PersonalInfo, StepData::Form(f)) => doc.personal_info = personal_info_from(f),
            (Step::Summary, StepData::Form(f)) => {
                doc.summary = Summary {
                    text: f.text("text"),
                }
            }
            (Step::Skills, StepData::Form(f)) => {
                doc.skills = SkillCategory::ALL
                    .iter()
                    .map(|c| (*c, dedup_case_insensitive(f.list(c.as_str()))))
                    .filter(|(_, items)| !items.is_empty())
                    .collect();
            }
            (Step::WorkExperience, StepData::Entries(l)) => {
                doc.work_experience = l.filled().map(work_from).collect()
            }
            (Step::Projects, StepData::Entries(l)) => doc.projects = l.filled().map(project_from).collect(),
            (Step::Education, StepData::Entries(l)) => doc.education = l.filled().map(education_from).collect(),
            (Step::Certifications, StepData::Entries(l)) => {
                doc.certifications = l.filled().map(certification_from).collect()
            }
            _ => {}
        }
    }
}

/// Runs a content section of `doc` through its step's form pipeline, so a
/// write that never went through the wizard is sanitized, capped and
/// deduplicated the same way. Entries whose dates are out of order are
/// rejected. Preference sections are left alone.
pub fn clean_section(section: SectionKey, doc: &mut ResumeDocument) -> Result<(), String> {
    let Some(step) = Step::for_section(section) else {
        return Ok(());
    };
    let Some(data) = StepData::load(step, doc) else {
        return Ok(());
    };
    if let StepData::Entries(list) = &data {
        let misordered = list
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_empty())
            .find_map(|(i, e)| e.date_order_error().map(|message| (i, message)));
        if let Some((i, message)) = misordered {
            return Err(format!("entry {}: {message}", i + 1));
        }
    }
    data.write_into(step, doc);
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Document slice <-> form values
// ────────────────────────────────────────────────────────────────────────────

fn text(name: &str, value: &str) -> (String, FieldValue) {
    (name.to_string(), FieldValue::Text(value.to_string()))
}

fn month(name: &str, value: Option<MonthYear>) -> (String, FieldValue) {
    (
        name.to_string(),
        FieldValue::Text(value.map(|m| m.to_string()).unwrap_or_default()),
    )
}

fn list(name: &str, items: &[String]) -> (String, FieldValue) {
    (name.to_string(), FieldValue::List(items.to_vec()))
}

fn personal_info_values(p: &PersonalInfo) -> BTreeMap<String, FieldValue> {
    BTreeMap::from([
        text("fullName", &p.full_name),
        text("jobTitle", &p.job_title),
        text("email", &p.email),
        text("phone", &p.phone),
        text("location", &p.location),
        text("linkedin", &p.linkedin),
        text("github", &p.github),
        text("portfolio", &p.portfolio),
    ])
}

fn personal_info_from(f: &FormState) -> PersonalInfo {
    PersonalInfo {
        full_name: f.text("fullName"),
        job_title: f.text("jobTitle"),
        email: f.text("email"),
        phone: f.text("phone"),
        location: f.text("location"),
        linkedin: f.text("linkedin"),
        github: f.text("github"),
        portfolio: f.text("portfolio"),
    }
}

fn work_values(w: &WorkExperience) -> BTreeMap<String, FieldValue> {
    BTreeMap::from([
        text("jobTitle", &w.job_title),
        text("company", &w.company),
        text("location", &w.location),
        month("startDate", w.start_date),
        month("endDate", w.end_date),
        ("currentlyWorking".to_string(), FieldValue::Flag(w.currently_working)),
        list("responsibilities", &w.responsibilities),
    ])
}

fn work_from(f: &FormState) -> WorkExperience {
    let currently_working = f.flag("currentlyWorking");
    WorkExperience {
        job_title: f.text("jobTitle"),
        company: f.text("company"),
        location: f.text("location"),
        start_date: f.month("startDate"),
        end_date: if currently_working { None } else { f.month("endDate") },
        currently_working,
        responsibilities: f.list("responsibilities"),
    }
}

fn project_values(p: &Project) -> BTreeMap<String, FieldValue> {
    BTreeMap::from([
        text("projectName", &p.project_name),
        list("technologies", &p.technologies),
        text("description", &p.description),
        text("liveUrl", &p.live_url),
        text("sourceCode", &p.source_code),
        list("highlights", &p.highlights),
    ])
}

fn project_from(f: &FormState) -> Project {
    Project {
        project_name: f.text("projectName"),
        technologies: dedup_case_insensitive(f.list("technologies")),
        description: f.text("description"),
        live_url: f.text("liveUrl"),
        source_code: f.text("sourceCode"),
        highlights: f.list("highlights"),
    }
}

fn education_values(e: &Education) -> BTreeMap<String, FieldValue> {
    BTreeMap::from([
        text("degree", &e.degree),
        text("institution", &e.institution),
        text("location", &e.location),
        month("graduationDate", e.graduation_date),
        text("gpa", &e.gpa),
    ])
}

fn education_from(f: &FormState) -> Education {
    Education {
        degree: f.text("degree"),
        institution: f.text("institution"),
        location: f.text("location"),
        graduation_date: f.month("graduationDate"),
        gpa: f.text("gpa"),
    }
}

fn certification_values(c: &Certification) -> BTreeMap<String, FieldValue> {
    BTreeMap::from([
        text("certificationName", &c.certification_name),
        text("issuer", &c.issuer),
        month("issueDate", c.issue_date),
        text("credentialUrl", &c.credential_url),
    ])
}

fn certification_from(f: &FormState) -> Certification {
    Certification {
        certification_name: f.text("certificationName"),
        issuer: f.text("issuer"),
        issue_date: f.month("issueDate"),
        credential_url: f.text("credentialUrl"),
    }
}
