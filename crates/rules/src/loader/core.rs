//! [`ConfigLoader`]: reads typed document sequences from the rules directory.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use platewatch_core::config::RulesConfig;

use crate::engine::DecisionEngine;
use crate::schema::{Rule, WatchList};

use super::error::{Result, RuleError};

pub const LISTS_FILE: &str = "lists";
pub const RULES_FILE: &str = "rules";

/// Loads `<stem>.yaml` (or `<stem>.yml`) files from one directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &RulesConfig) -> Self {
        Self::new(config.rules_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn locate(&self, stem: &str) -> Option<PathBuf> {
        ["yaml", "yml"]
            .iter()
            .map(|ext| self.dir.join(format!("{stem}.{ext}")))
            .find(|p| p.is_file())
    }

    /// Deserialize the sequence stored in `<stem>.yaml`.
    ///
    /// A missing or blank file yields an empty vector.
    pub fn load_documents<T: DeserializeOwned>(&self, stem: &str) -> Result<Vec<T>> {
        let Some(path) = self.locate(stem) else {
            debug!(dir = %self.dir.display(), stem, "no document file, nothing configured");
            return Ok(Vec::new());
        };
        let contents = fs::read_to_string(&path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        let documents: Vec<T> = serde_yaml::from_str(&contents)?;
        info!(path = %path.display(), count = documents.len(), "loaded documents");
        Ok(documents)
    }

    pub fn load_lists(&self) -> Result<Vec<WatchList>> {
        let lists: Vec<WatchList> = self.load_documents(LISTS_FILE)?;
        ensure_unique(lists.iter().map(|l| l.id.as_str()), "watch-list")?;
        Ok(lists)
    }

    pub fn load_rules(&self) -> Result<Vec<Rule>> {
        let rules: Vec<Rule> = self.load_documents(RULES_FILE)?;
        ensure_unique(rules.iter().map(|r| r.id.as_str()), "rule")?;
        Ok(rules)
    }

    /// Build a [`DecisionEngine`] holding every configured list and rule.
    pub fn load_decision_engine(&self, config: &RulesConfig) -> Result<DecisionEngine> {
        let engine = DecisionEngine::from_config(config)?;
        for list in self.load_lists()? {
            engine.resolver().register_list(list)?;
        }
        for rule in self.load_rules()? {
            engine.evaluator().register_rule(rule)?;
        }
        Ok(engine)
    }
}

fn ensure_unique<'a>(ids: impl Iterator<Item = &'a str>, kind: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(RuleError::Validation(format!("duplicate {kind} id: {id}")));
        }
    }
    Ok(())
}
