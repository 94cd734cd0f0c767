use chrono::{DateTime, Duration, Utc};
use mnemo_config::WorkingConfig;
use mnemo_core::{
    Clock, ContentClassifier, ContentKind, Context, ItemId, KeywordClassifier, MnemoError, Result,
    StopWordTokenizer, SystemClock, Tags, Tier, Tokenizer,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::query::MemoryQuery;
use crate::salience::{AccessStats, Salience, hours};
use crate::similarity::{context_key_coverage, coverage, intersects, normalize_tags};
use crate::tier::MemoryTier;

/// Relative weight of each query component in trace scoring.
const CONTENT_WEIGHT: f64 = 0.5;
const CONTEXT_WEIGHT: f64 = 0.25;
const TAG_WEIGHT: f64 = 0.25;

/// A point-in-time view of a working-memory trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTrace {
    pub id: ItemId,
    pub content: String,
    pub kind: ContentKind,
    pub context: Context,
    pub tags: Tags,
    /// Current strength, always within [0, 1].
    pub strength: f64,
    /// Exponential decay rate per hour.
    pub decay_rate: f64,
    pub access_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

struct TraceEntry {
    id: ItemId,
    content: String,
    kind: ContentKind,
    context: Context,
    tags: Tags,
    keywords: BTreeSet<String>,
    strength: Salience,
    access: AccessStats,
    decay_rate: f64,
    created_at: DateTime<Utc>,
}

impl TraceEntry {
    fn snapshot(&self) -> MemoryTrace {
        MemoryTrace {
            id: self.id,
            content: self.content.clone(),
            kind: self.kind,
            context: self.context.clone(),
            tags: self.tags.clone(),
            strength: self.strength.get(),
            decay_rate: self.decay_rate,
            access_count: self.access.count(),
            created_at: self.created_at,
            last_accessed_at: self.access.last_accessed(),
        }
    }

    fn access(&self, boost: f64, now: DateTime<Utc>) {
        self.strength.bump(boost);
        self.access.record(now);
    }
}

/// Result of storing a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredTrace {
    pub id: ItemId,
    /// The trace pushed out to make room, if the table was full.
    pub evicted: Option<ItemId>,
    /// True when identical content was already active and was refreshed instead.
    pub refreshed: bool,
}

/// Working memory: a small, capacity-bounded table of fast-decaying traces.
///
/// Active ids are kept in insertion order. A full table evicts the front of
/// that sequence before inserting; re-storing active content moves it to the back.
pub struct TraceTable {
    config: WorkingConfig,
    traces: HashMap<ItemId, TraceEntry>,
    order: VecDeque<ItemId>,
    tokenizer: Arc<dyn Tokenizer>,
    classifier: Arc<dyn ContentClassifier>,
    clock: Arc<dyn Clock>,
}

impl TraceTable {
    pub fn new(config: WorkingConfig) -> Self {
        Self {
            traces: HashMap::with_capacity(config.capacity),
            order: VecDeque::with_capacity(config.capacity),
            config,
            tokenizer: Arc::new(StopWordTokenizer::new()),
            classifier: Arc::new(KeywordClassifier::default()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ContentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Store a trace, evicting the oldest insertion if the table is full.
    pub fn store(&mut self, content: &str, context: Context, tags: Tags) -> Result<StoredTrace> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MnemoError::InvalidContent(
                "working trace content is empty".into(),
            ));
        }
        let now = self.clock.now();
        let tags = normalize_tags(&tags);

        if let Some(id) = self.find_by_content(content) {
            if let Some(entry) = self.traces.get_mut(&id) {
                entry.access(self.config.access_boost, now);
                entry.tags.extend(tags);
                entry.context.extend(context);
            }
            self.order.retain(|x| *x != id);
            self.order.push_back(id);
            debug!(%id, "refreshed working trace");
            return Ok(StoredTrace {
                id,
                evicted: None,
                refreshed: true,
            });
        }

        let mut evicted = None;
        if self.traces.len() >= self.config.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.traces.remove(&oldest);
                info!(id = %oldest, capacity = self.config.capacity, "working memory full, evicted oldest trace");
                evicted = Some(oldest);
            }
        }

        let id = Uuid::new_v4();
        let entry = TraceEntry {
            id,
            content: content.to_string(),
            kind: self.classifier.classify(content),
            keywords: self.tokenizer.tokenize(content),
            context,
            tags,
            strength: Salience::new(self.config.initial_strength),
            access: AccessStats::new(now),
            decay_rate: self.config.decay_rate,
            created_at: now,
        };
        debug!(%id, kind = ?entry.kind, "stored working trace");
        self.traces.insert(id, entry);
        self.order.push_back(id);

        Ok(StoredTrace {
            id,
            evicted,
            refreshed: false,
        })
    }

    fn find_by_content(&self, content: &str) -> Option<ItemId> {
        self.order
            .iter()
            .copied()
            .find(|id| self.traces.get(id).is_some_and(|t| t.content == content))
    }

    /// Score a trace against a query: weighted mean over the query parts that are present.
    fn score(&self, entry: &TraceEntry, keywords: &BTreeSet<String>, query: &MemoryQuery, tags: &Tags) -> f64 {
        let mut total = 0.0;
        let mut weight = 0.0;
        if !keywords.is_empty() {
            total += CONTENT_WEIGHT * coverage(keywords, &entry.keywords);
            weight += CONTENT_WEIGHT;
        }
        if !query.context.is_empty() {
            total += CONTEXT_WEIGHT * context_key_coverage(&query.context, &entry.context);
            weight += CONTEXT_WEIGHT;
        }
        if !tags.is_empty() {
            total += TAG_WEIGHT * coverage(tags, &entry.tags);
            weight += TAG_WEIGHT;
        }
        if weight == 0.0 { 0.0 } else { total / weight }
    }

    /// Recall traces scoring at least `threshold`, each paired with its score.
    ///
    /// Every returned trace is accessed (strength nudged up, access count incremented).
    /// Results are ordered by strength, then access count, both descending.
    pub fn retrieve_scored(&self, query: &MemoryQuery, threshold: f64) -> Vec<(MemoryTrace, f64)> {
        let now = self.clock.now();
        let keywords = self.tokenizer.tokenize(&query.text);
        let tags = normalize_tags(&query.tags);

        let mut hits: Vec<(MemoryTrace, f64)> = self
            .order
            .iter()
            .filter_map(|id| self.traces.get(id))
            .filter_map(|entry| {
                let score = self.score(entry, &keywords, query, &tags);
                if score < threshold {
                    return None;
                }
                entry.access(self.config.access_boost, now);
                Some((entry.snapshot(), score))
            })
            .collect();

        hits.sort_by(|(a, _), (b, _)| {
            b.strength
                .total_cmp(&a.strength)
                .then(b.access_count.cmp(&a.access_count))
        });
        debug!(matched = hits.len(), "working memory retrieval");
        hits
    }

    /// Recall traces scoring at least `threshold`. See [`TraceTable::retrieve_scored`].
    pub fn retrieve(&self, query: &MemoryQuery, threshold: f64) -> Vec<MemoryTrace> {
        self.retrieve_scored(query, threshold)
            .into_iter()
            .map(|(trace, _)| trace)
            .collect()
    }

    /// Remove every trace sharing at least one tag with `tags`.
    pub fn clear_by_tags(&mut self, tags: &Tags) -> Vec<ItemId> {
        let tags = normalize_tags(tags);
        let doomed: Vec<ItemId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.traces.get(id).is_some_and(|t| intersects(&t.tags, &tags)))
            .collect();
        self.remove_all(&doomed);
        if !doomed.is_empty() {
            info!(count = doomed.len(), "cleared working traces by tag");
        }
        doomed
    }

    fn remove_all(&mut self, ids: &[ItemId]) {
        for id in ids {
            self.traces.remove(id);
        }
        self.order.retain(|id| !ids.contains(id));
    }

    pub fn get(&self, id: &ItemId) -> Option<MemoryTrace> {
        self.traces.get(id).map(TraceEntry::snapshot)
    }

    pub fn remove(&mut self, id: &ItemId) -> Option<MemoryTrace> {
        let entry = self.traces.remove(id)?;
        self.order.retain(|x| x != id);
        Some(entry.snapshot())
    }

    /// Active ids, oldest insertion first.
    pub fn active_ids(&self) -> Vec<ItemId> {
        self.order.iter().copied().collect()
    }

    pub fn by_kind(&self, kind: ContentKind) -> Vec<MemoryTrace> {
        self.order
            .iter()
            .filter_map(|id| self.traces.get(id))
            .filter(|t| t.kind == kind)
            .map(TraceEntry::snapshot)
            .collect()
    }
}

impl MemoryTier for TraceTable {
    fn tier(&self) -> Tier {
        Tier::Working
    }

    fn len(&self) -> usize {
        self.traces.len()
    }

    fn capacity(&self) -> usize {
        self.config.capacity
    }

    fn average_strength(&self) -> f64 {
        if self.traces.is_empty() {
            return 0.0;
        }
        self.traces.values().map(|t| t.strength.get()).sum::<f64>() / self.traces.len() as f64
    }

    fn contains(&self, id: &ItemId) -> bool {
        self.traces.contains_key(id)
    }

    /// strength *= exp(-decay_rate * hours); traces under the floor are removed.
    fn decay(&mut self, elapsed: Duration, now: DateTime<Utc>) -> Vec<ItemId> {
        let mut pending = Vec::new();
        for id in &self.order {
            let Some(entry) = self.traces.get(id) else {
                continue;
            };
            let window = hours(entry.access.decay_window(elapsed, now));
            let strength = entry.strength.scale((-entry.decay_rate * window).exp());
            if strength < self.config.removal_floor {
                pending.push(*id);
            }
        }
        self.remove_all(&pending);
        if !pending.is_empty() {
            info!(removed = pending.len(), "working traces decayed away");
        }
        pending
    }
}
