//! Field validation rules.
//!
//! A rule is a closed set of variants rather than an open trait: the form
//! schema is data, and every check a step needs is one of these shapes.
//! Caller-specific checks go through `Rule::Custom`.
//!
//! Validation never fails: a rule returns an error message or `None`.

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::models::resume::MonthYear;

pub type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum Rule {
    /// Non-blank after trimming. `message` overrides the default wording.
    Required { message: Option<String> },
    /// Character count bounds on the trimmed value.
    Length { min: Option<usize>, max: Option<usize> },
    Email,
    /// Digit count range; only digits, spaces and `+-().` are accepted.
    Phone { min_digits: usize, max_digits: usize },
    /// http/https only.
    Url,
    /// `YYYY-MM` or `MM/YYYY`.
    MonthYear,
    Custom { message: String, predicate: Predicate },
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required { message } => f.debug_struct("Required").field("message", message).finish(),
            Rule::Length { min, max } => f
                .debug_struct("Length")
                .field("min", min)
                .field("max", max)
                .finish(),
            Rule::Email => f.write_str("Email"),
            Rule::Phone {
                min_digits,
                max_digits,
            } => f
                .debug_struct("Phone")
                .field("min_digits", min_digits)
                .field("max_digits", max_digits)
                .finish(),
            Rule::Url => f.write_str("Url"),
            Rule::MonthYear => f.write_str("MonthYear"),
            Rule::Custom { message, .. } => f.debug_struct("Custom").field("message", message).finish(),
        }
    }
}

impl Rule {
    pub fn required() -> Self {
        Rule::Required { message: None }
    }

    pub fn required_with(message: impl Into<String>) -> Self {
        Rule::Required {
            message: Some(message.into()),
        }
    }

    pub fn max_len(max: usize) -> Self {
        Rule::Length {
            min: None,
            max: Some(max),
        }
    }

    pub fn len_between(min: usize, max: usize) -> Self {
        Rule::Length {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn phone() -> Self {
        Rule::Phone {
            min_digits: 7,
            max_digits: 15,
        }
    }

    pub fn custom(
        message: impl Into<String>,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Rule::Custom {
            message: message.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Rule::Required { .. })
    }

    /// Evaluation order: required, length, typed format, custom predicate.
    fn rank(&self) -> u8 {
        match self {
            Rule::Required { .. } => 0,
            Rule::Length { .. } => 1,
            Rule::Email | Rule::Phone { .. } | Rule::Url | Rule::MonthYear => 2,
            Rule::Custom { .. } => 3,
        }
    }
}

/// Evaluates one rule. Blank values pass everything except `Required`.
pub fn validate(label: &str, value: &str, rule: &Rule) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return match rule {
            Rule::Required { message } => Some(
                message
                    .clone()
                    .unwrap_or_else(|| format!("{label} is required")),
            ),
            _ => None,
        };
    }

    match rule {
        Rule::Required { .. } => None,
        Rule::Length { min, max } => {
            let len = value.chars().count();
            match (min, max) {
                (Some(min), _) if len < *min => {
                    Some(format!("{label} must be at least {min} characters"))
                }
                (_, Some(max)) if len > *max => {
                    Some(format!("{label} must be at most {max} characters"))
                }
                _ => None,
            }
        }
        Rule::Email => {
            (!email_pattern().is_match(value)).then(|| "Please enter a valid email address".to_string())
        }
        Rule::Phone {
            min_digits,
            max_digits,
        } => {
            let allowed = value
                .chars()
                .all(|c| c.is_ascii_digit() || " +-().".contains(c));
            let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
            if !allowed || digits < *min_digits || digits > *max_digits {
                Some(format!(
                    "{label} must contain between {min_digits} and {max_digits} digits"
                ))
            } else {
                None
            }
        }
        Rule::Url => (!url_pattern().is_match(value))
            .then(|| format!("{label} must be a valid URL starting with http:// or https://")),
        Rule::MonthYear => MonthYear::parse(value)
            .is_none()
            .then(|| format!("{label} must be a month in YYYY-MM format")),
        Rule::Custom { message, predicate } => (!predicate(value)).then(|| message.clone()),
    }
}

/// Evaluates `rules` in the fixed order regardless of declaration order.
/// The first failing rule's message wins.
pub fn validate_rules(label: &str, value: &str, rules: &[Rule]) -> Option<String> {
    let mut ordered: Vec<&Rule> = rules.iter().collect();
    ordered.sort_by_key(|r| r.rank());
    ordered.into_iter().find_map(|rule| validate(label, value, rule))
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").expect("email pattern must compile")
    })
}

fn url_pattern() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| {
        Regex::new(r"(?i)^https?://[a-z0-9-]+(\.[a-z0-9-]+)*(:\d{1,5})?([/?#]\S*)?$")
            .expect("url pattern must compile")
    })
}
