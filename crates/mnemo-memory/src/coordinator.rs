use chrono::{DateTime, Duration, Utc};
use mnemo_config::MnemoConfig;
use mnemo_core::{
    Clock, ContentClassifier, Context, EventBus, ItemId, KeywordClassifier, MemoryEvent,
    MnemoError, RemovalReason, Result, StopWordTokenizer, SystemClock, Tags, Tier, Tokenizer,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::consolidation::{
    ConsolidationReport, ConsolidationRequest, ExtractionPolicy, RuleExtractionPolicy,
};
use crate::episodic::{Episode, EpisodeStore};
use crate::query::MemoryQuery;
use crate::salience::clamp_unit;
use crate::semantic::{AssociativeGraph, CATEGORY_KEY};
use crate::tier::{MemoryTier, TierStats};
use crate::working::TraceTable;

/// One retrieval hit from any tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: ItemId,
    pub tier: Tier,
    pub content: String,
    /// Strength (working, semantic) or importance (episodic).
    pub strength: f64,
    pub access_count: u64,
    /// Similarity score, or activation for semantic hits.
    pub relevance: f64,
    pub tags: Tags,
}

/// Per-tier status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub working: TierStats,
    pub episodic: TierStats,
    pub semantic: TierStats,
    pub cross_tier_links: usize,
    pub last_sweep: DateTime<Utc>,
}

impl MemoryStats {
    pub fn tier(&self, tier: Tier) -> &TierStats {
        match tier {
            Tier::Working => &self.working,
            Tier::Episodic => &self.episodic,
            Tier::Semantic => &self.semantic,
        }
    }
}

/// What a decay sweep removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub at: DateTime<Utc>,
    /// Seconds of decay applied.
    pub elapsed_secs: i64,
    pub working: Vec<ItemId>,
    pub episodic: Vec<ItemId>,
    pub semantic: Vec<ItemId>,
    pub dropped_links: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.working.len() + self.episodic.len() + self.semantic.len()
    }
}

/// Unordered id pair.
fn link_key(a: ItemId, b: ItemId) -> (ItemId, ItemId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Facade over the three tiers.
///
/// Every tier sits behind its own lock, so retrievals against different tiers
/// never contend, and retrievals within a tier share a read lock. Cross-tier
/// links and the sweep timestamp are owned here, not by any tier.
pub struct MemoryCoordinator {
    config: MnemoConfig,
    working: RwLock<TraceTable>,
    episodic: RwLock<EpisodeStore>,
    semantic: RwLock<AssociativeGraph>,
    links: RwLock<HashMap<(ItemId, ItemId), f64>>,
    last_sweep: Mutex<DateTime<Utc>>,
    policy: Arc<dyn ExtractionPolicy>,
    tokenizer: Arc<dyn Tokenizer>,
    classifier: Arc<dyn ContentClassifier>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl MemoryCoordinator {
    /// Build a coordinator from a validated config.
    ///
    /// Nothing is checked here; a config that fails [`MnemoConfig::validate`]
    /// (a zero capacity, say) leaves the tiers unable to hold their bounds.
    /// Use [`MemoryCoordinator::try_new`] for configs from outside.
    pub fn new(config: MnemoConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(StopWordTokenizer::new());
        let classifier: Arc<dyn ContentClassifier> = Arc::new(KeywordClassifier::default());
        let policy = Arc::new(RuleExtractionPolicy::new(
            config.coordinator.domain_rules.clone(),
        ));
        Self {
            working: RwLock::new(TraceTable::new(config.working.clone())),
            episodic: RwLock::new(EpisodeStore::new(config.episodic.clone())),
            semantic: RwLock::new(AssociativeGraph::new(config.semantic.clone())),
            links: RwLock::new(HashMap::new()),
            last_sweep: Mutex::new(clock.now()),
            events: EventBus::new(config.coordinator.event_capacity),
            config,
            policy,
            tokenizer,
            classifier,
            clock,
        }
    }

    /// Validate `config`, then build a coordinator from it.
    pub fn try_new(config: MnemoConfig) -> Result<Self> {
        for warning in config.validate().map_err(MnemoError::Config)? {
            warn!(%warning, "memory config");
        }
        Ok(Self::new(config))
    }

    /// Use a different clock. Resets the tiers, so call it before storing anything.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.rebuild()
    }

    /// Use a different tokenizer. Resets the tiers, so call it before storing anything.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self.rebuild()
    }

    /// Use a different classifier. Resets the tiers, so call it before storing anything.
    pub fn with_classifier(mut self, classifier: Arc<dyn ContentClassifier>) -> Self {
        self.classifier = classifier;
        self.rebuild()
    }

    pub fn with_extraction_policy(mut self, policy: Arc<dyn ExtractionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    fn rebuild(self) -> Self {
        let working = TraceTable::new(self.config.working.clone())
            .with_tokenizer(self.tokenizer.clone())
            .with_classifier(self.classifier.clone())
            .with_clock(self.clock.clone());
        let episodic = EpisodeStore::new(self.config.episodic.clone())
            .with_tokenizer(self.tokenizer.clone())
            .with_clock(self.clock.clone());
        let semantic = AssociativeGraph::new(self.config.semantic.clone())
            .with_tokenizer(self.tokenizer.clone())
            .with_clock(self.clock.clone());
        Self {
            working: RwLock::new(working),
            episodic: RwLock::new(episodic),
            semantic: RwLock::new(semantic),
            links: RwLock::new(HashMap::new()),
            last_sweep: Mutex::new(self.clock.now()),
            ..self
        }
    }

    pub fn config(&self) -> &MnemoConfig {
        &self.config
    }

    pub fn working(&self) -> &RwLock<TraceTable> {
        &self.working
    }

    pub fn episodic(&self) -> &RwLock<EpisodeStore> {
        &self.episodic
    }

    pub fn semantic(&self) -> &RwLock<AssociativeGraph> {
        &self.semantic
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.events.subscribe()
    }

    /// Store content in one tier.
    ///
    /// Episodic content becomes a single-event episode with the default importance.
    pub fn store(&self, content: &str, tier: Tier, context: Context, tags: Tags) -> Result<ItemId> {
        let (id, evicted) = match tier {
            Tier::Working => {
                let stored = self.working.write().store(content, context, tags)?;
                (stored.id, stored.evicted.into_iter().collect::<Vec<_>>())
            }
            Tier::Episodic => {
                let episode = Episode {
                    context,
                    tags,
                    importance: self.config.episodic.default_importance,
                    ..Episode::new(content.trim()).at(self.clock.now())
                };
                let stored = self.episodic.write().store_episode(episode)?;
                (stored.id, stored.pruned)
            }
            Tier::Semantic => {
                let stored = self.semantic.write().store_concept(content, &context, &tags)?;
                (stored.id, stored.evicted.into_iter().collect::<Vec<_>>())
            }
        };

        for gone in &evicted {
            self.events.publish(MemoryEvent::Evicted { id: *gone, tier });
        }
        self.drop_links(&evicted);
        self.events.publish(MemoryEvent::Stored { id, tier });
        debug!(%id, %tier, "stored");
        Ok(id)
    }

    /// Query each requested tier and merge, strongest first.
    ///
    /// Never fails; a query nothing matches yields an empty list.
    pub fn retrieve(&self, query: &MemoryQuery, tiers: &[Tier], threshold: f64) -> Vec<MemoryItem> {
        let mut items = Vec::new();
        for tier in Tier::ALL.into_iter().filter(|t| tiers.contains(t)) {
            match tier {
                Tier::Working => {
                    let working = self.working.read();
                    items.extend(working.retrieve_scored(query, threshold).into_iter().map(
                        |(trace, score)| MemoryItem {
                            id: trace.id,
                            tier,
                            content: trace.content,
                            strength: trace.strength,
                            access_count: trace.access_count,
                            relevance: score,
                            tags: trace.tags,
                        },
                    ));
                }
                Tier::Episodic => {
                    let episodic = self.episodic.read();
                    items.extend(
                        episodic
                            .retrieve_similar_scored(query, threshold)
                            .into_iter()
                            .map(|(episode, score)| MemoryItem {
                                id: episode.id,
                                tier,
                                content: episode.text(),
                                strength: episode.importance,
                                access_count: episode.access_count,
                                relevance: score,
                                tags: episode.tags,
                            }),
                    );
                }
                Tier::Semantic => {
                    let semantic = self.semantic.read();
                    items.extend(semantic.retrieve(query, threshold).into_iter().map(|hit| {
                        MemoryItem {
                            id: hit.concept.id,
                            tier,
                            content: hit.concept.content,
                            strength: hit.concept.strength,
                            access_count: hit.concept.access_count,
                            relevance: hit.activation,
                            tags: hit.concept.keywords,
                        }
                    }));
                }
            }
        }

        items.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then(b.access_count.cmp(&a.access_count))
        });
        debug!(hits = items.len(), ?tiers, "retrieved");
        items
    }

    /// [`retrieve`](Self::retrieve) with the configured `similarity_threshold`.
    pub fn retrieve_default(&self, query: &MemoryQuery, tiers: &[Tier]) -> Vec<MemoryItem> {
        self.retrieve(query, tiers, self.config.coordinator.similarity_threshold)
    }

    /// Store an experience as an episode, summarise it into the graph, and purge
    /// now-redundant working traces.
    ///
    /// Only storing the episode can fail. Extraction errors are logged and reported
    /// in [`ConsolidationReport::extraction_error`]; the episode stays stored.
    pub fn consolidate(&self, request: ConsolidationRequest) -> Result<ConsolidationReport> {
        let episode = request.into_episode(self.config.episodic.default_importance, self.clock.now());
        let fallback_id = episode.id;
        let (episode, pruned) = {
            let mut episodic = self.episodic.write();
            let stored = episodic.store_episode(episode.clone())?;
            let episode = episodic.get(&stored.id);
            (episode, stored.pruned)
        };
        for gone in &pruned {
            self.events.publish(MemoryEvent::Evicted {
                id: *gone,
                tier: Tier::Episodic,
            });
        }
        self.drop_links(&pruned);

        // Capacity pruning can take the new episode itself; nothing is left to
        // summarise or to link concepts against.
        let Some(episode) = episode else {
            info!(episode = %fallback_id, "consolidated episode pruned on arrival");
            let report = ConsolidationReport {
                episode_id: fallback_id,
                episode_pruned: true,
                ..Default::default()
            };
            self.events.publish(MemoryEvent::Consolidated {
                episode_id: report.episode_id,
                concepts: Vec::new(),
                purged_traces: 0,
            });
            return Ok(report);
        };
        self.events.publish(MemoryEvent::Stored {
            id: episode.id,
            tier: Tier::Episodic,
        });

        let mut report = ConsolidationReport {
            episode_id: episode.id,
            ..Default::default()
        };

        if episode.succeeded() || self.policy.matches_domain(&episode) {
            if let Err(e) = self.extract_into_graph(&episode, &mut report) {
                warn!(episode = %episode.id, error = %e, "semantic extraction failed, episode kept");
                report.extraction_error = Some(e.to_string());
            }
        }

        if episode.importance > self.config.coordinator.consolidation_threshold {
            report.purged_traces = self.working.write().clear_by_tags(&episode.tags);
            for id in &report.purged_traces {
                self.events.publish(MemoryEvent::Removed {
                    id: *id,
                    tier: Tier::Working,
                    reason: RemovalReason::Consolidated,
                });
            }
            self.drop_links(&report.purged_traces);
        }

        info!(
            episode = %report.episode_id,
            concepts = report.concept_ids.len(),
            purged = report.purged_traces.len(),
            "consolidated"
        );
        self.events.publish(MemoryEvent::Consolidated {
            episode_id: report.episode_id,
            concepts: report.concept_ids.clone(),
            purged_traces: report.purged_traces.len(),
        });
        Ok(report)
    }

    fn extract_into_graph(&self, episode: &Episode, report: &mut ConsolidationReport) -> Result<()> {
        let summary = self.policy.extract(episode).map_err(|e| match e {
            MnemoError::Extraction(_) => e,
            other => MnemoError::Extraction(other.to_string()),
        })?;
        let Some(summary) = summary else {
            debug!(episode = %episode.id, "nothing to extract");
            return Ok(());
        };
        let mut context = Context::new();
        context.insert(CATEGORY_KEY.to_string(), summary.category.clone().into());

        for statement in summary.statements() {
            let stored = self
                .semantic
                .write()
                .store_concept(statement, &context, &episode.tags)?;
            if let Some(gone) = stored.evicted {
                self.events.publish(MemoryEvent::Evicted {
                    id: gone,
                    tier: Tier::Semantic,
                });
                self.drop_links(&[gone]);
            }
            if !stored.existing {
                self.events.publish(MemoryEvent::Stored {
                    id: stored.id,
                    tier: Tier::Semantic,
                });
            }
            self.links
                .write()
                .insert(link_key(episode.id, stored.id), clamp_unit(episode.importance));
            report.concept_ids.push(stored.id);
        }
        Ok(())
    }

    fn tier_of(&self, id: &ItemId) -> Option<Tier> {
        if self.working.read().contains(id) {
            Some(Tier::Working)
        } else if self.episodic.read().contains(id) {
            Some(Tier::Episodic)
        } else if self.semantic.read().contains(id) {
            Some(Tier::Semantic)
        } else {
            None
        }
    }

    /// Record a weak cross-tier relation between two stored items.
    ///
    /// The pair is unordered; linking it again replaces the weight.
    pub fn create_association(&self, id1: ItemId, id2: ItemId, weight: f64) -> Result<()> {
        let t1 = self.tier_of(&id1).ok_or(MnemoError::UnknownId(id1))?;
        let t2 = self.tier_of(&id2).ok_or(MnemoError::UnknownId(id2))?;
        if id1 == id2 {
            return Err(MnemoError::InvalidContent(
                "an item cannot be associated with itself".into(),
            ));
        }
        self.links.write().insert(link_key(id1, id2), clamp_unit(weight));
        debug!(%id1, %t1, %id2, %t2, weight, "cross-tier association");
        Ok(())
    }

    /// Items linked to `id`, with link weights.
    pub fn links_for(&self, id: &ItemId) -> Vec<(ItemId, f64)> {
        self.links
            .read()
            .iter()
            .filter_map(|(&(a, b), &w)| {
                if a == *id {
                    Some((b, w))
                } else if b == *id {
                    Some((a, w))
                } else {
                    None
                }
            })
            .collect()
    }

    fn drop_links(&self, removed: &[ItemId]) -> usize {
        if removed.is_empty() {
            return 0;
        }
        let mut links = self.links.write();
        let before = links.len();
        links.retain(|(a, b), _| !removed.contains(a) && !removed.contains(b));
        before - links.len()
    }

    /// Remove an item from whichever tier holds it.
    pub fn remove(&self, id: &ItemId) -> Option<Tier> {
        let tier = if self.working.write().remove(id).is_some() {
            Tier::Working
        } else if self.episodic.write().remove(id).is_some() {
            Tier::Episodic
        } else if self.semantic.write().remove(id).is_some() {
            Tier::Semantic
        } else {
            return None;
        };
        self.drop_links(&[*id]);
        self.events.publish(MemoryEvent::Removed {
            id: *id,
            tier,
            reason: RemovalReason::Explicit,
        });
        Some(tier)
    }

    /// Decay every tier by the time since the last sweep.
    ///
    /// Returns `None` without touching anything when less than
    /// `sweep_interval_secs` has passed. Each tier is decayed under its own
    /// write lock, one tier at a time.
    pub fn run_decay_sweep(&self, now: DateTime<Utc>) -> Option<SweepReport> {
        let mut last_sweep = self.last_sweep.lock();
        let elapsed = now - *last_sweep;
        let interval = self.sweep_interval();
        if elapsed < interval {
            debug!(elapsed_secs = elapsed.num_seconds(), "decay sweep skipped");
            return None;
        }
        *last_sweep = now;

        let working = self.working.write().decay(elapsed, now);
        let episodic = self.episodic.write().decay(elapsed, now);
        let semantic = self.semantic.write().decay(elapsed, now);

        for (tier, ids) in [
            (Tier::Working, &working),
            (Tier::Episodic, &episodic),
            (Tier::Semantic, &semantic),
        ] {
            for id in ids {
                self.events.publish(MemoryEvent::Removed {
                    id: *id,
                    tier,
                    reason: RemovalReason::Decayed,
                });
            }
        }

        let removed: Vec<ItemId> = working.iter().chain(&episodic).chain(&semantic).copied().collect();
        let dropped_links = self.drop_links(&removed);
        let report = SweepReport {
            at: now,
            elapsed_secs: elapsed.num_seconds(),
            working,
            episodic,
            semantic,
            dropped_links,
        };
        info!(removed = report.removed(), dropped_links, "decay sweep completed");
        self.events.publish(MemoryEvent::SweepCompleted {
            at: now,
            removed: report.removed(),
        });
        Some(report)
    }

    /// Out-of-range intervals saturate, so the sweep effectively never runs.
    fn sweep_interval(&self) -> Duration {
        i64::try_from(self.config.coordinator.sweep_interval_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Run a decay sweep as of the injected clock's current time.
    pub fn maybe_sweep(&self) -> Option<SweepReport> {
        self.run_decay_sweep(self.clock.now())
    }

    pub fn status(&self) -> MemoryStats {
        // Sweep timestamp first: a running sweep holds it while taking tier locks.
        let last_sweep = *self.last_sweep.lock();
        let working = self.working.read().stats();
        let episodic = self.episodic.read().stats();
        let semantic = self.semantic.read().stats();
        let cross_tier_links = self.links.read().len();
        MemoryStats {
            working,
            episodic,
            semantic,
            cross_tier_links,
            last_sweep,
        }
    }
}
