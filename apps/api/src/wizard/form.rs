//! Per-form state: values, per-field errors and the touched set.
//!
//! One `FormState` backs a single-form step (personal info, summary, skills)
//! or a single entry of a list step (one job, one project, ...).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::WizardError;
use crate::models::resume::MonthYear;
use crate::wizard::rules::{validate_rules, Rule};
use crate::wizard::sanitize::{sanitize, sanitize_value, SanitizeMode};

// ────────────────────────────────────────────────────────────────────────────
// Values
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Converts raw JSON from the client. Strings are kept as text, arrays as
    /// lists (non-string items become empty), booleans as flags. Anything else
    /// is treated as an empty string.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(b) => FieldValue::Flag(*b),
            Value::Array(items) => FieldValue::List(
                items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_default())
                    .collect(),
            ),
            Value::String(s) => FieldValue::Text(s.clone()),
            _ => FieldValue::Text(String::new()),
        }
    }

    pub fn as_text(&self) -> &str {
        match self {
            FieldValue::Text(s) => s,
            _ => "",
        }
    }

    /// Flags are never blank; `false` is an answer.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(|i| i.trim().is_empty()),
            FieldValue::Flag(_) => false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Schema
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Name,
    Multiline,
    /// A list of short strings, capped at `max_items`. Rules apply per item.
    List { max_items: usize },
    Flag,
}

impl FieldKind {
    fn empty_value(self) -> FieldValue {
        match self {
            FieldKind::List { .. } => FieldValue::List(Vec::new()),
            FieldKind::Flag => FieldValue::Flag(false),
            _ => FieldValue::Text(String::new()),
        }
    }

    fn sanitize_mode(self) -> SanitizeMode {
        match self {
            FieldKind::Name => SanitizeMode::Name,
            FieldKind::Multiline => SanitizeMode::Multiline,
            _ => SanitizeMode::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub rules: Vec<Rule>,
}

impl FieldSpec {
    pub fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Checks that involve more than one field. Errors attach to the dependent field.
#[derive(Debug, Clone)]
pub enum CrossCheck {
    /// `field` is required unless the `flag` field is set.
    RequiredUnless {
        field: &'static str,
        flag: &'static str,
    },
    /// `end` must not be earlier than `start`; skipped while `unless` is set.
    DateOrder {
        start: &'static str,
        end: &'static str,
        unless: &'static str,
    },
}

#[derive(Debug, Clone, Default)]
pub struct FormSchema {
    pub fields: Vec<FieldSpec>,
    pub checks: Vec<CrossCheck>,
    /// Fields that decide whether an entry counts as "filled in". An entry whose
    /// identity fields are all blank is dropped from the document.
    pub identity: Vec<&'static str>,
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields whose cross-check outcome depends on `name`.
    fn dependents(&self, name: &str) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter_map(|check| match *check {
                CrossCheck::RequiredUnless { field, flag } if flag == name => Some(field),
                CrossCheck::DateOrder { start, end, unless } if start == name || unless == name => {
                    Some(end)
                }
                _ => None,
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    /// Nothing touched yet.
    Pristine,
    /// Touched, no errors showing, but required fields still missing.
    Touched,
    Valid,
    Invalid,
}

/// Serializable snapshot of a form for the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    pub values: BTreeMap<String, FieldValue>,
    pub errors: BTreeMap<String, String>,
    pub touched: Vec<String>,
    pub status: FormStatus,
    pub valid: bool,
}

/// An outstanding problem, used for the "fix these first" banner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldIssue {
    pub field: String,
    pub label: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct FormState {
    schema: Arc<FormSchema>,
    values: BTreeMap<String, FieldValue>,
    errors: BTreeMap<String, String>,
    touched: BTreeSet<String>,
}

impl FormState {
    pub fn new(schema: Arc<FormSchema>) -> Self {
        let values = schema
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.kind.empty_value()))
            .collect();
        Self {
            schema,
            values,
            errors: BTreeMap::new(),
            touched: BTreeSet::new(),
        }
    }

    /// Loads previously saved values without touching anything. Non-blank
    /// values that fail validation get their error shown right away.
    pub fn with_values(schema: Arc<FormSchema>, loaded: BTreeMap<String, FieldValue>) -> Self {
        let mut form = Self::new(schema);
        for (name, value) in loaded {
            let Some(spec) = form.schema.field(&name).cloned() else {
                continue;
            };
            if let Ok(clean) = coerce(&spec, value) {
                form.values.insert(name, clean);
            }
        }
        let names: Vec<&'static str> = form.schema.fields.iter().map(|f| f.name).collect();
        for name in names {
            let blank = form.values.get(name).map_or(true, FieldValue::is_blank);
            if !blank {
                form.refresh_error(name);
            }
        }
        form
    }

    /// Sanitizes and stores `value`, marks the field touched and revalidates it
    /// (plus any cross-checked field that depends on it). Returns the field's
    /// error, if any.
    pub fn on_change(&mut self, field: &str, value: FieldValue) -> Result<Option<String>, WizardError> {
        let spec = self.spec(field)?.clone();
        let clean = coerce(&spec, value)?;
        self.values.insert(spec.name.to_string(), clean);
        self.touched.insert(spec.name.to_string());
        self.refresh_error(spec.name);

        for dependent in self.schema.dependents(spec.name) {
            if self.touched.contains(dependent) || self.errors.contains_key(dependent) {
                self.refresh_error(dependent);
            }
        }
        Ok(self.errors.get(spec.name).cloned())
    }

    /// Marks the field touched and validates it without changing its value.
    pub fn on_blur(&mut self, field: &str) -> Result<Option<String>, WizardError> {
        let name = self.spec(field)?.name;
        self.touched.insert(name.to_string());
        self.refresh_error(name);
        Ok(self.errors.get(name).cloned())
    }

    /// Touches and validates every field, surfacing all errors at once.
    pub fn touch_all(&mut self) {
        let names: Vec<&'static str> = self.schema.fields.iter().map(|f| f.name).collect();
        for name in names {
            self.touched.insert(name.to_string());
            self.refresh_error(name);
        }
    }

    /// True iff every required field is non-blank and no field holds an error.
    pub fn is_step_valid(&self) -> bool {
        self.errors.is_empty()
            && self
                .schema
                .fields
                .iter()
                .filter(|f| self.is_required(f.name))
                .all(|f| !self.is_blank(f.name))
    }

    pub fn status(&self) -> FormStatus {
        if !self.errors.is_empty() {
            FormStatus::Invalid
        } else if self.touched.is_empty() {
            FormStatus::Pristine
        } else if self.is_step_valid() {
            FormStatus::Valid
        } else {
            FormStatus::Touched
        }
    }

    /// True if every identity field (or, without identity fields, every field)
    /// is blank.
    pub fn is_empty(&self) -> bool {
        if self.schema.identity.is_empty() {
            self.values.values().all(|v| v.is_blank() || *v == FieldValue::Flag(false))
        } else {
            self.schema.identity.iter().all(|name| self.is_blank(name))
        }
    }

    /// Current errors plus any required field that is still blank.
    pub fn issues(&self) -> Vec<FieldIssue> {
        self.schema
            .fields
            .iter()
            .filter_map(|spec| {
                let message = self.errors.get(spec.name).cloned().or_else(|| {
                    (self.is_required(spec.name) && self.is_blank(spec.name))
                        .then(|| format!("{} is required", spec.label))
                })?;
                Some(FieldIssue {
                    field: spec.name.to_string(),
                    label: spec.label.to_string(),
                    message,
                })
            })
            .collect()
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn is_touched(&self, field: &str) -> bool {
        self.touched.contains(field)
    }

    /// Trimmed text of a text field; empty for missing or non-text fields.
    pub fn text(&self, field: &str) -> String {
        self.values
            .get(field)
            .map(|v| v.as_text().trim().to_string())
            .unwrap_or_default()
    }

    /// Non-blank, trimmed items of a list field.
    pub fn list(&self, field: &str) -> Vec<String> {
        match self.values.get(field) {
            Some(FieldValue::List(items)) => items
                .iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn flag(&self, field: &str) -> bool {
        matches!(self.values.get(field), Some(FieldValue::Flag(true)))
    }

    pub fn month(&self, field: &str) -> Option<MonthYear> {
        MonthYear::parse(&self.text(field))
    }

    pub fn view(&self) -> FormView {
        FormView {
            values: self.values.clone(),
            errors: self.errors.clone(),
            touched: self.touched.iter().cloned().collect(),
            status: self.status(),
            valid: self.is_step_valid(),
        }
    }

    // ── internals ───────────────────────────────────────────────────────────

    fn spec(&self, field: &str) -> Result<&FieldSpec, WizardError> {
        self.schema.field(field).ok_or_else(|| WizardError::UnknownField {
            field: field.to_string(),
        })
    }

    fn is_blank(&self, field: &str) -> bool {
        self.values.get(field).map_or(true, FieldValue::is_blank)
    }

    fn is_required(&self, field: &str) -> bool {
        let by_rule = self
            .schema
            .field(field)
            .is_some_and(|f| f.rules.iter().any(Rule::is_required));
        by_rule
            || self.schema.checks.iter().any(|check| match *check {
                CrossCheck::RequiredUnless { field: f, flag } => f == field && !self.flag(flag),
                CrossCheck::DateOrder { .. } => false,
            })
    }

    fn refresh_error(&mut self, field: &str) {
        match self.compute_error(field) {
            Some(message) => {
                self.errors.insert(field.to_string(), message);
            }
            None => {
                self.errors.remove(field);
            }
        }
    }

    fn compute_error(&self, field: &str) -> Option<String> {
        let spec = self.schema.field(field)?;
        let own = match self.values.get(field)? {
            FieldValue::Text(text) => validate_rules(spec.label, text, &spec.rules),
            FieldValue::List(items) => list_error(spec, items),
            FieldValue::Flag(_) => None,
        };
        own.or_else(|| self.cross_error(field))
    }

    fn cross_error(&self, field: &str) -> Option<String> {
        self.schema.checks.iter().find_map(|check| match *check {
            CrossCheck::RequiredUnless { field: f, flag } if f == field => {
                (!self.flag(flag) && self.is_blank(f)).then(|| format!("{} is required", self.label(f)))
            }
            CrossCheck::DateOrder { start, end, unless } if end == field => self.date_order(start, end, unless),
            _ => None,
        })
    }

    /// The first date-order violation, whether or not the fields were touched.
    pub fn date_order_error(&self) -> Option<String> {
        self.schema.checks.iter().find_map(|check| match *check {
            CrossCheck::DateOrder { start, end, unless } => self.date_order(start, end, unless),
            CrossCheck::RequiredUnless { .. } => None,
        })
    }

    fn date_order(&self, start: &str, end: &str, unless: &str) -> Option<String> {
        if self.flag(unless) {
            return None;
        }
        match (self.month(start), self.month(end)) {
            (Some(s), Some(e)) if e < s => Some(format!(
                "{} cannot be before {}",
                self.label(end),
                self.label(start)
            )),
            _ => None,
        }
    }

    fn label<'a>(&'a self, field: &'a str) -> &'a str {
        self.schema.field(field).map_or(field, |f| f.label)
    }
}

/// Required on a list means "at least one non-blank item"; every other rule
/// applies to each item.
fn list_error(spec: &FieldSpec, items: &[String]) -> Option<String> {
    let (required, per_item): (Vec<&Rule>, Vec<&Rule>) = spec.rules.iter().partition(|r| r.is_required());
    if !required.is_empty() && items.iter().all(|i| i.trim().is_empty()) {
        return validate_rules(spec.label, "", &spec.rules);
    }
    let per_item: Vec<Rule> = per_item.into_iter().cloned().collect();
    items.iter().enumerate().find_map(|(i, item)| {
        validate_rules(spec.label, item, &per_item).map(|msg| format!("Item {}: {msg}", i + 1))
    })
}

/// Sanitizes a value and checks it has the shape the field expects.
fn coerce(spec: &FieldSpec, value: FieldValue) -> Result<FieldValue, WizardError> {
    let mode = spec.kind.sanitize_mode();
    match (spec.kind, value) {
        (FieldKind::Flag, FieldValue::Flag(b)) => Ok(FieldValue::Flag(b)),
        (FieldKind::Flag, FieldValue::Text(s)) => match s.trim() {
            "true" => Ok(FieldValue::Flag(true)),
            "false" | "" => Ok(FieldValue::Flag(false)),
            other => Err(invalid(spec, format!("expected true or false, got '{other}'"))),
        },
        (FieldKind::List { max_items }, value) => {
            let raw = match value {
                FieldValue::List(items) => items,
                FieldValue::Text(s) => s.lines().map(str::to_string).collect(),
                FieldValue::Flag(_) => return Err(invalid(spec, "expected a list".to_string())),
            };
            let mut items: Vec<String> = raw.iter().map(|i| sanitize(i, SanitizeMode::Text)).collect();
            if items.len() > max_items {
                warn!(
                    field = spec.name,
                    received = items.len(),
                    max = max_items,
                    "Truncating over-long list"
                );
                items.truncate(max_items);
            }
            Ok(FieldValue::List(items))
        }
        (_, FieldValue::Text(s)) => Ok(FieldValue::Text(sanitize_value(&Value::String(s), mode))),
        (_, FieldValue::List(_)) => Err(invalid(spec, "expected text, got a list".to_string())),
        (_, FieldValue::Flag(_)) => Err(invalid(spec, "expected text, got a boolean".to_string())),
    }
}

fn invalid(spec: &FieldSpec, reason: String) -> WizardError {
    WizardError::InvalidValue {
        field: spec.name.to_string(),
        reason,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn job_schema() -> Arc<FormSchema> {
        Arc::new(FormSchema {
            fields: vec![
                FieldSpec::new("jobTitle", "Job title", FieldKind::Name).rule(Rule::required()),
                FieldSpec::new("startDate", "Start date", FieldKind::Text)
                    .rule(Rule::required())
                    .rule(Rule::MonthYear),
                FieldSpec::new("endDate", "End date", FieldKind::Text).rule(Rule::MonthYear),
                FieldSpec::new("currentlyWorking", "Currently working", FieldKind::Flag),
                FieldSpec::new("responsibilities", "Responsibility", FieldKind::List { max_items: 3 })
                    .rule(Rule::max_len(20)),
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
            identity: vec!["jobTitle"],
        })
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[test]
    fn test_new_form_is_pristine_and_invalid() {
        let form = FormState::new(job_schema());
        assert_eq!(form.status(), FormStatus::Pristine);
        assert!(!form.is_step_valid());
        assert!(form.is_empty());
        assert!(form.error("jobTitle").is_none());
    }

    #[test]
    fn test_change_sanitizes_and_touches() {
        let mut form = FormState::new(job_schema());
        let err = form
            .on_change("jobTitle", text("<b>Lead</b>  Engineer"))
            .unwrap();
        assert!(err.is_none());
        assert_eq!(form.text("jobTitle"), "Lead Engineer");
        assert!(form.is_touched("jobTitle"));
        assert_eq!(form.status(), FormStatus::Touched);
    }

    #[test]
    fn test_date_order_error_ignores_touch_state() {
        let mut loaded = BTreeMap::new();
        loaded.insert("jobTitle".to_string(), text("Engineer"));
        loaded.insert("startDate".to_string(), text("2022-05"));
        loaded.insert("endDate".to_string(), text("2019-01"));
        let mut form = FormState::with_values(job_schema(), loaded);
        assert_eq!(
            form.date_order_error().as_deref(),
            Some("End date cannot be before Start date")
        );

        form.on_change("currentlyWorking", FieldValue::Flag(true)).unwrap();
        assert_eq!(form.date_order_error(), None);
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let mut form = FormState::new(job_schema());
        let err = form.on_change("salary", text("1")).unwrap_err();
        assert_eq!(
            err,
            WizardError::UnknownField {
                field: "salary".to_string()
            }
        );
        assert!(form.on_blur("salary").is_err());
    }

    #[test]
    fn test_blur_surfaces_required_error() {
        let mut form = FormState::new(job_schema());
        let err = form.on_blur("jobTitle").unwrap();
        assert_eq!(err.as_deref(), Some("Job title is required"));
        assert_eq!(form.status(), FormStatus::Invalid);
    }

    #[test]
    fn test_end_date_required_unless_currently_working() {
        let mut form = FormState::new(job_schema());
        form.on_change("jobTitle", text("Engineer")).unwrap();
        form.on_change("startDate", text("2020-01")).unwrap();
        assert!(!form.is_step_valid());

        let err = form.on_blur("endDate").unwrap();
        assert_eq!(err.as_deref(), Some("End date is required"));

        form.on_change("currentlyWorking", FieldValue::Flag(true)).unwrap();
        assert!(form.error("endDate").is_none());
        assert!(form.is_step_valid());
        assert_eq!(form.status(), FormStatus::Valid);
    }

    #[test]
    fn test_end_date_before_start_date() {
        let mut form = FormState::new(job_schema());
        form.on_change("jobTitle", text("Engineer")).unwrap();
        form.on_change("startDate", text("2021-06")).unwrap();
        let err = form.on_change("endDate", text("2020-01")).unwrap();
        assert_eq!(err.as_deref(), Some("End date cannot be before Start date"));
        assert!(!form.is_step_valid());

        // Fixing the start date clears the dependent error.
        form.on_change("startDate", text("2019-01")).unwrap();
        assert!(form.error("endDate").is_none());
        assert!(form.is_step_valid());
    }

    #[test]
    fn test_list_is_truncated_and_validated_per_item() {
        let mut form = FormState::new(job_schema());
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        form.on_change("responsibilities", FieldValue::List(items)).unwrap();
        assert_eq!(form.list("responsibilities").len(), 3);

        let long = vec!["ok".to_string(), "x".repeat(25)];
        let err = form
            .on_change("responsibilities", FieldValue::List(long))
            .unwrap();
        assert_eq!(
            err.as_deref(),
            Some("Item 2: Responsibility must be at most 20 characters")
        );
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let mut form = FormState::new(job_schema());
        assert!(matches!(
            form.on_change("jobTitle", FieldValue::Flag(true)),
            Err(WizardError::InvalidValue { .. })
        ));
        assert!(matches!(
            form.on_change("currentlyWorking", text("maybe")),
            Err(WizardError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_from_json_non_string_becomes_empty() {
        assert_eq!(FieldValue::from_json(&serde_json::json!(42)), text(""));
        assert_eq!(FieldValue::from_json(&Value::Null), text(""));
        assert_eq!(
            FieldValue::from_json(&serde_json::json!(["a", 1])),
            FieldValue::List(vec!["a".to_string(), String::new()])
        );
    }

    #[test]
    fn test_loaded_values_show_errors_without_touching() {
        let mut loaded = BTreeMap::new();
        loaded.insert("jobTitle".to_string(), text("Engineer"));
        loaded.insert("startDate".to_string(), text("last spring"));
        let form = FormState::with_values(job_schema(), loaded);
        assert!(!form.is_touched("startDate"));
        assert!(form.error("startDate").is_some());
        assert!(!form.is_empty());
    }

    #[test]
    fn test_issues_list_untouched_required_fields() {
        let form = FormState::new(job_schema());
        let fields: Vec<String> = form.issues().into_iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["jobTitle", "startDate", "endDate"]);
    }
}
