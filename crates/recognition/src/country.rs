//! Regional plate templates.
//!
//! Templates are matched against already-normalized plates, so letter
//! classes are written in the folded alphabet (`0` stands in for `O`,
//! `1` for `I`, `8` for `B`). `B` stays in the classes so unfolded text
//! classifies the same way. Digit positions are plain `\d`.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use platewatch_core::EngineError;

/// A named regional pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryTemplate {
    pub code: String,
    pub pattern: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl CountryTemplate {
    pub fn new(code: &str, pattern: &str) -> Self {
        Self {
            code: code.to_string(),
            pattern: pattern.to_string(),
            enabled: true,
        }
    }
}

/// Built-in templates, in default evaluation order.
pub fn default_templates() -> Vec<CountryTemplate> {
    vec![
        CountryTemplate::new("ru", r"^[ABCEHKMPTXYУ08]\d{3}[ABCEHKMPTXYУ08]{2}\d{2,3}$"),
        CountryTemplate::new("by", r"^\d{4}[ABCEHKMPTXYУ08]{2}\d$"),
        CountryTemplate::new("kz", r"^[ABCEHKMPTXYУ08]{3}\d{3}[ABCEHKMPTXYУ08]{2}$"),
        CountryTemplate::new("ua", r"^[ABCEHKMPTX018]{2}\d{4}[ABCEHKMPTX018]{2}$"),
        CountryTemplate::new("eu", r"^[A-Z0-9]{6,8}$"),
    ]
}

/// First-match classifier over an ordered set of enabled templates.
#[derive(Debug, Clone)]
pub struct CountryClassifier {
    patterns: Vec<(String, Regex)>,
}

impl CountryClassifier {
    /// Compile the enabled templates. A malformed pattern is fatal.
    pub fn new(templates: &[CountryTemplate]) -> Result<Self, EngineError> {
        let mut patterns = Vec::with_capacity(templates.len());
        for template in templates.iter().filter(|t| t.enabled) {
            let regex = RegexBuilder::new(&template.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    EngineError::Configuration(format!(
                        "invalid country template '{}': {e}",
                        template.code
                    ))
                })?;
            patterns.push((template.code.to_uppercase(), regex));
        }
        Ok(Self { patterns })
    }

    /// Select built-in templates by code; the order of `codes` is the
    /// evaluation order. Unknown codes are a configuration error.
    pub fn from_codes(codes: &[String]) -> Result<Self, EngineError> {
        let builtin = default_templates();
        let mut selected = Vec::with_capacity(codes.len());
        for code in codes {
            let template = builtin
                .iter()
                .find(|t| t.code.eq_ignore_ascii_case(code))
                .ok_or_else(|| {
                    EngineError::Configuration(format!("unknown country template: {code}"))
                })?;
            selected.push(template.clone());
        }
        Self::new(&selected)
    }

    /// Code of the first template the plate matches.
    pub fn classify(&self, plate: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, regex)| regex.is_match(plate))
            .map(|(code, _)| code.as_str())
    }

    pub fn codes(&self) -> Vec<&str> {
        self.patterns.iter().map(|(c, _)| c.as_str()).collect()
    }
}
