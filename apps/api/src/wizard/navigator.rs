//! Step navigation: a fixed, ordered list of wizard steps with forward
//! navigation gated on the active step's validity.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::WizardError;
use crate::models::resume::SectionKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    PersonalInfo,
    Summary,
    WorkExperience,
    Projects,
    Skills,
    Education,
    Certifications,
    Finalize,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::PersonalInfo,
        Step::Summary,
        Step::WorkExperience,
        Step::Projects,
        Step::Skills,
        Step::Education,
        Step::Certifications,
        Step::Finalize,
    ];

    pub const FIRST: Step = Step::PersonalInfo;
    pub const LAST: Step = Step::Finalize;

    /// 1-based position, as shown in the sidebar.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn from_number(number: u8) -> Option<Step> {
        Self::ALL.get((number as usize).checked_sub(1)?).copied()
    }

    pub fn next(self) -> Option<Step> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn prev(self) -> Option<Step> {
        Self::ALL.get(self.index().checked_sub(1)?).copied()
    }

    /// The document section this step edits. Finalize edits preferences
    /// (visibility, order, customization) rather than a content section.
    pub fn section(self) -> Option<SectionKey> {
        match self {
            Step::PersonalInfo => Some(SectionKey::PersonalInfo),
            Step::Summary => Some(SectionKey::Summary),
            Step::WorkExperience => Some(SectionKey::WorkExperience),
            Step::Projects => Some(SectionKey::Projects),
            Step::Skills => Some(SectionKey::Skills),
            Step::Education => Some(SectionKey::Education),
            Step::Certifications => Some(SectionKey::Certifications),
            Step::Finalize => None,
        }
    }

    /// The step that edits `section`; `None` for the Finalize preferences.
    pub fn for_section(section: SectionKey) -> Option<Step> {
        Self::ALL.into_iter().find(|step| step.section() == Some(section))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::PersonalInfo => "personalInfo",
            Step::Summary => "summary",
            Step::WorkExperience => "workExperience",
            Step::Projects => "projects",
            Step::Skills => "skills",
            Step::Education => "education",
            Step::Certifications => "certifications",
            Step::Finalize => "finalize",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::PersonalInfo => "Personal Info",
            Step::Summary => "Summary",
            Step::WorkExperience => "Work Experience",
            Step::Projects => "Projects",
            Step::Skills => "Skills",
            Step::Education => "Education",
            Step::Certifications => "Certifications",
            Step::Finalize => "Finalize",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Accepts the camelCase key or the 1-based step number.
impl FromStr for Step {
    type Err = WizardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Step::from_number(n).ok_or_else(|| WizardError::UnknownStep(s.to_string()));
        }
        Step::ALL
            .into_iter()
            .find(|step| step.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| WizardError::UnknownStep(s.to_string()))
    }
}

/// Where a transition landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Step,
    pub to: Step,
}

impl Transition {
    pub fn moved(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepNavigator {
    current: Step,
    completed: BTreeSet<Step>,
    /// Furthest step ever reached through `next`.
    furthest: Step,
}

impl Default for StepNavigator {
    fn default() -> Self {
        Self {
            current: Step::FIRST,
            completed: BTreeSet::new(),
            furthest: Step::FIRST,
        }
    }
}

impl StepNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Step {
        self.current
    }

    pub fn completed(&self) -> &BTreeSet<Step> {
        &self.completed
    }

    pub fn highest_completed(&self) -> Option<Step> {
        self.completed.iter().next_back().copied()
    }

    pub fn furthest(&self) -> Step {
        self.furthest
    }

    /// Advances one step iff `current_valid`. On success the step being left
    /// is recorded as completed. At the last step this is a no-op.
    pub fn next(&mut self, current_valid: bool) -> Transition {
        let from = self.current;
        if !current_valid {
            return Transition { from, to: from };
        }
        if let Some(to) = from.next() {
            self.completed.insert(from);
            self.current = to;
            self.furthest = self.furthest.max(to);
        }
        Transition {
            from,
            to: self.current,
        }
    }

    /// Always succeeds; a no-op at the first step.
    pub fn back(&mut self) -> Transition {
        let from = self.current;
        if let Some(to) = from.prev() {
            self.current = to;
        }
        Transition {
            from,
            to: self.current,
        }
    }

    /// Jumps to `target` if it is the current step, not beyond the highest
    /// completed step, or the furthest step reached (so jumping back never
    /// strands an unfinished step). Completed steps are not re-validated.
    pub fn jump_to(&mut self, target: Step) -> Result<Transition, WizardError> {
        let from = self.current;
        let reachable = target == from
            || target == self.furthest
            || self.highest_completed().is_some_and(|h| target <= h);
        if !reachable {
            return Err(WizardError::NavigationLocked {
                target,
                highest: self
                    .highest_completed()
                    .map_or_else(|| "none".to_string(), |h| h.to_string()),
            });
        }
        self.current = target;
        Ok(Transition { from, to: target })
    }
}
