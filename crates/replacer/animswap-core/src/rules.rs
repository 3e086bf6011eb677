//! Rule registry for one project.
//!
//! Rules are keyed by the (case-insensitive) name of the original clip they
//! replace. Slot numbers only exist once the host's clip table is known, so
//! the per-slot view is built during augmentation (see [`crate::table`]).

use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::condition::{Condition, TermSpec};
use crate::error::RuleError;
use crate::ids::FormId;
use crate::predicate::PredicateLibrary;

/// Replace `from` with `to` for every actor spawned from `template`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateLink {
    pub from: String,
    pub to: String,
    pub template: FormId,
}

/// Replace `from` with `to` while `conditions` hold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionLink {
    pub from: String,
    pub to: String,
    pub priority: i32,
    #[serde(default)]
    pub conditions: Vec<TermSpec>,
}

/// Parsed rule files for one project, as produced by the rule loader.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSource {
    #[serde(default)]
    pub templates: Vec<TemplateLink>,
    #[serde(default)]
    pub conditions: Vec<ConditionLink>,
}

impl RuleSource {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateRule {
    pub template: FormId,
    pub to: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConditionRule {
    pub priority: i32,
    pub condition: Arc<Condition>,
    pub to: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    Template(TemplateRule),
    Condition(ConditionRule),
}

impl Rule {
    /// Template rules sit at priority 0.
    #[inline]
    pub fn priority(&self) -> i32 {
        match self {
            Rule::Template(_) => 0,
            Rule::Condition(rule) => rule.priority,
        }
    }

    /// Replacement clip name. Empty means "keep the original clip".
    #[inline]
    pub fn target(&self) -> &str {
        match self {
            Rule::Template(rule) => &rule.to,
            Rule::Condition(rule) => &rule.to,
        }
    }
}

/// Outcome of loading a [`RuleSource`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadReport {
    pub accepted: usize,
    pub rejected: Vec<RuleError>,
}

#[derive(Clone, Debug, Default)]
struct ClipRules {
    /// Load order.
    rules: Vec<Rule>,
}

#[derive(Clone, Debug, Default)]
pub struct RuleRegistry {
    clips: HashMap<String, ClipRules>,
    len: usize,
}

fn clip_key(from: &str) -> Result<String, RuleError> {
    if from.is_empty() {
        return Err(RuleError::EmptySourceClip);
    }
    Ok(from.to_ascii_lowercase())
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert_template_rule(&mut self, from: &str, template: FormId, to: &str) -> Result<(), RuleError> {
        let key = clip_key(from)?;
        let clip = self.clips.entry(key).or_default();
        let taken = clip
            .rules
            .iter()
            .any(|r| matches!(r, Rule::Template(t) if t.template == template));
        if taken {
            return Err(RuleError::DuplicateTemplate {
                clip: from.to_string(),
                template,
            });
        }
        clip.rules.push(Rule::Template(TemplateRule {
            template,
            to: to.to_string(),
        }));
        self.len += 1;
        Ok(())
    }

    pub fn insert_condition_rule(
        &mut self,
        from: &str,
        priority: i32,
        condition: Condition,
        to: &str,
    ) -> Result<(), RuleError> {
        if priority == 0 {
            return Err(RuleError::ReservedPriority {
                clip: from.to_string(),
            });
        }
        let key = clip_key(from)?;
        let clip = self.clips.entry(key).or_default();
        let taken = clip
            .rules
            .iter()
            .any(|r| matches!(r, Rule::Condition(c) if c.priority == priority));
        if taken {
            return Err(RuleError::DuplicatePriority {
                clip: from.to_string(),
                priority,
            });
        }
        clip.rules.push(Rule::Condition(ConditionRule {
            priority,
            condition: Arc::new(condition),
            to: to.to_string(),
        }));
        self.len += 1;
        Ok(())
    }

    /// Load every rule of `source`, dropping (and logging) the ones that fail.
    pub fn load(&mut self, source: &RuleSource, lib: &PredicateLibrary) -> LoadReport {
        let mut report = LoadReport::default();

        for link in &source.templates {
            match self.insert_template_rule(&link.from, link.template, &link.to) {
                Ok(()) => report.accepted += 1,
                Err(err) => {
                    log::warn!("dropping template rule {} -> {}: {err}", link.from, link.to);
                    report.rejected.push(err);
                }
            }
        }

        for link in &source.conditions {
            let inserted = Condition::compile(&link.conditions, lib)
                .and_then(|condition| self.insert_condition_rule(&link.from, link.priority, condition, &link.to));
            match inserted {
                Ok(()) => report.accepted += 1,
                Err(err) => {
                    log::warn!(
                        "dropping condition rule {} -> {} (priority {}): {err}",
                        link.from,
                        link.to,
                        link.priority
                    );
                    report.rejected.push(err);
                }
            }
        }

        report
    }

    /// Rules for an original clip, highest priority first.
    pub fn lookup_rules(&self, clip: &str) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules_in_load_order(clip).iter().collect();
        // stable: template rules keep load order among themselves
        rules.sort_by(|a, b| b.priority().cmp(&a.priority()));
        rules
    }

    /// Rules for an original clip in the order they were loaded.
    pub fn rules_in_load_order(&self, clip: &str) -> &[Rule] {
        self.clips
            .get(&clip.to_ascii_lowercase())
            .map(|c| c.rules.as_slice())
            .unwrap_or(&[])
    }

    /// Whether any rule targets this (already lower-cased) clip name.
    pub(crate) fn has_rules_lowercase(&self, clip: &str) -> bool {
        self.clips.contains_key(clip)
    }

    pub(crate) fn rules_lowercase(&self, clip: &str) -> &[Rule] {
        self.clips.get(clip).map(|c| c.rules.as_slice()).unwrap_or(&[])
    }
}
