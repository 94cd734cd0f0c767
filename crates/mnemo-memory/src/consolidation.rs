//! Consolidation: promoting an experience from the short-lived tiers into the graph.
//!
//! The coordinator receives a [`ConsolidationRequest`], stores it as an episode,
//! asks an [`ExtractionPolicy`] for a [`SemanticSummary`], and stores each summary
//! statement as a concept. The tiers never reference each other directly.

use chrono::{DateTime, Utc};
use mnemo_config::DomainRule;
use mnemo_core::{Context, ItemId, Result, Tags, context_str};
use serde::{Deserialize, Serialize};

use crate::episodic::{Episode, Outcome};

/// An experience to consolidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationRequest {
    pub events: Vec<String>,
    pub context: Context,
    pub tags: Tags,
    pub outcome: Option<Outcome>,
    /// Falls back to `episodic.default_importance` when unset.
    pub importance: Option<f64>,
    pub emotional_valence: f64,
    /// Falls back to the coordinator clock when unset.
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConsolidationRequest {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            events: vec![event.into()],
            ..Default::default()
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn with_valence(mut self, valence: f64) -> Self {
        self.emotional_valence = valence;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub(crate) fn into_episode(self, default_importance: f64, now: DateTime<Utc>) -> Episode {
        Episode {
            id: uuid::Uuid::new_v4(),
            timestamp: self.timestamp.unwrap_or(now),
            context: self.context,
            events: self.events,
            outcome: self.outcome,
            importance: self.importance.unwrap_or(default_importance),
            tags: self.tags,
            emotional_valence: self.emotional_valence,
            access_count: 0,
        }
    }
}

/// Knowledge distilled from one episode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticSummary {
    pub category: String,
    /// Recurring facts about the situation.
    pub patterns: Vec<String>,
    /// Action-to-outcome statements from successful episodes.
    pub rules: Vec<String>,
}

impl SemanticSummary {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.rules.is_empty()
    }

    /// Patterns followed by rules.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().chain(&self.rules).map(String::as_str)
    }
}

/// Decides what an episode teaches the semantic tier.
pub trait ExtractionPolicy: Send + Sync {
    /// Whether the episode's context belongs to a domain worth summarising.
    fn matches_domain(&self, episode: &Episode) -> bool;

    /// Summarise an episode. `Ok(None)` means there was nothing to learn.
    fn extract(&self, episode: &Episode) -> Result<Option<SemanticSummary>>;
}

/// Default policy driven by configured [`DomainRule`]s.
#[derive(Debug, Clone, Default)]
pub struct RuleExtractionPolicy {
    rules: Vec<DomainRule>,
}

impl RuleExtractionPolicy {
    pub fn new(rules: Vec<DomainRule>) -> Self {
        Self { rules }
    }

    fn matching_rule(&self, episode: &Episode) -> Option<&DomainRule> {
        self.rules
            .iter()
            .find(|rule| context_str(&episode.context, &rule.key) == Some(rule.value.as_str()))
    }
}

impl ExtractionPolicy for RuleExtractionPolicy {
    fn matches_domain(&self, episode: &Episode) -> bool {
        self.matching_rule(episode).is_some()
    }

    fn extract(&self, episode: &Episode) -> Result<Option<SemanticSummary>> {
        let category = match self.matching_rule(episode) {
            Some(rule) => rule.category.clone(),
            None => context_str(&episode.context, "category")
                .unwrap_or(episode.context_type())
                .to_string(),
        };

        let mut patterns: Vec<String> = episode
            .context
            .iter()
            .filter_map(|(key, value)| value.as_str().map(|v| format!("{key} {v}")))
            .collect();
        if !episode.tags.is_empty() {
            let tags: Vec<&str> = episode.tags.iter().map(String::as_str).collect();
            patterns.push(format!("{category} {}", tags.join(" ")));
        }

        let rules = match episode.outcome {
            Some(ref outcome) if outcome.success && !outcome.description.trim().is_empty() => {
                vec![format!("{} leads to {}", episode.events.join(" then "), outcome.description)]
            }
            _ => Vec::new(),
        };

        let summary = SemanticSummary {
            category,
            patterns,
            rules,
        };
        Ok((!summary.is_empty()).then_some(summary))
    }
}

/// What a consolidation did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub episode_id: ItemId,
    /// The episode was pruned by capacity as soon as it was stored; nothing
    /// else was done.
    pub episode_pruned: bool,
    /// Concepts stored (or reinforced) from the extracted summary.
    pub concept_ids: Vec<ItemId>,
    /// Working-tier traces purged because they shared a tag with the episode.
    pub purged_traces: Vec<ItemId>,
    /// Set when extraction failed; the episode is stored regardless.
    pub extraction_error: Option<String>,
}
