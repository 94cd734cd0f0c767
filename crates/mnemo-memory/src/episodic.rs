use chrono::{DateTime, Duration, Utc};
use mnemo_config::EpisodicConfig;
use mnemo_core::{
    Clock, Context, ItemId, MnemoError, Result, StopWordTokenizer, SystemClock, Tags, Tier,
    Tokenizer, context_str,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::query::MemoryQuery;
use crate::salience::{AccessStats, Salience, clamp_unit, hours};
use crate::similarity::{context_key_overlap, jaccard, normalize_tags};
use crate::tier::MemoryTier;

/// Context key whose value names the episode's context type.
pub const CONTEXT_TYPE_KEY: &str = "type";
/// Context type used when an episode has none.
pub const DEFAULT_CONTEXT_TYPE: &str = "general";

/// How an episode ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub description: String,
}

impl Outcome {
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            success: true,
            description: description.into(),
        }
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            success: false,
            description: description.into(),
        }
    }
}

/// An episode is a timestamped record of something that happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub context: Context,
    /// What happened, in order.
    pub events: Vec<String>,
    pub outcome: Option<Outcome>,
    /// Retention priority in [0, 1].
    pub importance: f64,
    pub tags: Tags,
    /// Emotional tone in [-1, 1].
    pub emotional_valence: f64,
    /// Times recalled by similarity. Maintained by the store.
    #[serde(default)]
    pub access_count: u64,
}

impl Episode {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            context: Context::new(),
            events: vec![event.into()],
            outcome: None,
            importance: 0.5,
            tags: Tags::new(),
            emotional_valence: 0.0,
            access_count: 0,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
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

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_valence(mut self, valence: f64) -> Self {
        self.emotional_valence = valence;
        self
    }

    /// The context type this episode is indexed under.
    pub fn context_type(&self) -> &str {
        context_str(&self.context, CONTEXT_TYPE_KEY).unwrap_or(DEFAULT_CONTEXT_TYPE)
    }

    /// Events and outcome description as one text.
    pub fn text(&self) -> String {
        let mut text = self.events.join(" ");
        if let Some(ref outcome) = self.outcome {
            text.push(' ');
            text.push_str(&outcome.description);
        }
        text
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.as_ref().is_some_and(|o| o.success)
    }
}

struct EpisodeEntry {
    /// The stored episode; its `importance` field is stale, see `importance`.
    episode: Episode,
    importance: Salience,
    access: AccessStats,
    keywords: BTreeSet<String>,
    seq: u64,
}

impl EpisodeEntry {
    fn snapshot(&self) -> Episode {
        let mut episode = self.episode.clone();
        episode.importance = self.importance.get();
        episode.access_count = self.access.count();
        episode
    }

    fn time_key(&self) -> (DateTime<Utc>, u64) {
        (self.episode.timestamp, self.seq)
    }
}

/// Result of storing an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEpisode {
    pub id: ItemId,
    /// Episodes removed because the store went over `max_episodes`.
    /// May include `id` itself when it ranked last.
    pub pruned: Vec<ItemId>,
}

/// Episodic memory: timestamped, tagged records with three secondary indices.
///
/// The main table owns every episode. The time, context-type, and tag indices
/// hold ids only and are updated in the same `&mut self` call as the table,
/// so callers never observe them out of step.
pub struct EpisodeStore {
    config: EpisodicConfig,
    episodes: HashMap<ItemId, EpisodeEntry>,
    by_time: BTreeMap<(DateTime<Utc>, u64), ItemId>,
    by_context: HashMap<String, BTreeSet<ItemId>>,
    by_tag: HashMap<String, BTreeSet<ItemId>>,
    next_seq: u64,
    tokenizer: Arc<dyn Tokenizer>,
    clock: Arc<dyn Clock>,
}

impl EpisodeStore {
    pub fn new(config: EpisodicConfig) -> Self {
        Self {
            config,
            episodes: HashMap::new(),
            by_time: BTreeMap::new(),
            by_context: HashMap::new(),
            by_tag: HashMap::new(),
            next_seq: 0,
            tokenizer: Arc::new(StopWordTokenizer::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Insert an episode into the table and all three indices.
    ///
    /// An episode whose id is already stored replaces the old one.
    pub fn store_episode(&mut self, mut episode: Episode) -> Result<StoredEpisode> {
        episode.events.retain(|e| !e.trim().is_empty());
        if episode.events.is_empty() {
            return Err(MnemoError::InvalidContent("episode has no events".into()));
        }
        episode.tags = normalize_tags(&episode.tags);
        episode.importance = clamp_unit(episode.importance);
        episode.emotional_valence = if episode.emotional_valence.is_nan() {
            0.0
        } else {
            episode.emotional_valence.clamp(-1.0, 1.0)
        };

        let id = episode.id;
        if self.episodes.contains_key(&id) {
            self.remove_entry(&id);
        }

        let entry = EpisodeEntry {
            importance: Salience::new(episode.importance),
            access: AccessStats::new(self.clock.now()),
            keywords: self.tokenizer.tokenize(&episode.text()),
            seq: self.next_seq,
            episode,
        };
        self.next_seq += 1;
        self.index(&entry);
        debug!(%id, context_type = entry.episode.context_type(), "stored episode");
        self.episodes.insert(id, entry);

        let pruned = self.enforce_capacity();
        Ok(StoredEpisode { id, pruned })
    }

    fn index(&mut self, entry: &EpisodeEntry) {
        let id = entry.episode.id;
        self.by_time.insert(entry.time_key(), id);
        self.by_context
            .entry(entry.episode.context_type().to_string())
            .or_default()
            .insert(id);
        for tag in &entry.episode.tags {
            self.by_tag.entry(tag.clone()).or_default().insert(id);
        }
    }

    /// Remove from the table and every index; empty index buckets are dropped.
    fn remove_entry(&mut self, id: &ItemId) -> Option<EpisodeEntry> {
        let entry = self.episodes.remove(id)?;
        self.by_time.remove(&entry.time_key());
        let context_type = entry.episode.context_type();
        if let Some(ids) = self.by_context.get_mut(context_type) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_context.remove(context_type);
            }
        }
        for tag in &entry.episode.tags {
            if let Some(ids) = self.by_tag.get_mut(tag) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }
        Some(entry)
    }

    /// Keep the top `max_episodes` by (importance desc, timestamp desc); drop the rest.
    fn enforce_capacity(&mut self) -> Vec<ItemId> {
        if self.episodes.len() <= self.config.max_episodes {
            return Vec::new();
        }
        let mut ranked: Vec<(f64, (DateTime<Utc>, u64), ItemId)> = self
            .episodes
            .values()
            .map(|e| (e.importance.get(), e.time_key(), e.episode.id))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));

        let doomed: Vec<ItemId> = ranked
            .into_iter()
            .skip(self.config.max_episodes)
            .map(|(_, _, id)| id)
            .collect();
        for id in &doomed {
            self.remove_entry(id);
        }
        info!(
            pruned = doomed.len(),
            max = self.config.max_episodes,
            "episodic memory over capacity, pruned least important"
        );
        doomed
    }

    fn similarity(&self, entry: &EpisodeEntry, query: &MemoryQuery, keywords: &BTreeSet<String>, tags: &Tags) -> f64 {
        self.config.context_weight * context_key_overlap(&query.context, &entry.episode.context)
            + self.config.tag_weight * jaccard(tags, &entry.episode.tags)
            + self.config.content_weight * jaccard(keywords, &entry.keywords)
    }

    /// Episodes with similarity ≥ `threshold`, paired with their similarity.
    ///
    /// Ordered by similarity desc, then timestamp desc, then insertion order.
    /// Each returned episode counts as accessed.
    pub fn retrieve_similar_scored(&self, query: &MemoryQuery, threshold: f64) -> Vec<(Episode, f64)> {
        let now = self.clock.now();
        let keywords = self.tokenizer.tokenize(&query.text);
        let tags = normalize_tags(&query.tags);

        let mut hits: Vec<(&EpisodeEntry, f64)> = self
            .episodes
            .values()
            .map(|e| (e, self.similarity(e, query, &keywords, &tags)))
            .filter(|(_, s)| *s >= threshold)
            .collect();
        hits.sort_by(|(a, sa), (b, sb)| {
            sb.total_cmp(sa)
                .then(b.episode.timestamp.cmp(&a.episode.timestamp))
                .then(a.seq.cmp(&b.seq))
        });

        debug!(matched = hits.len(), "episodic similarity retrieval");
        hits.into_iter()
            .map(|(entry, score)| {
                entry.importance.bump(self.config.access_boost);
                entry.access.record(now);
                (entry.snapshot(), score)
            })
            .collect()
    }

    /// Episodes with similarity ≥ `threshold`. See [`EpisodeStore::retrieve_similar_scored`].
    pub fn retrieve_similar(&self, query: &MemoryQuery, threshold: f64) -> Vec<Episode> {
        self.retrieve_similar_scored(query, threshold)
            .into_iter()
            .map(|(episode, _)| episode)
            .collect()
    }

    fn newest_first<'a>(&'a self, ids: impl IntoIterator<Item = &'a ItemId>) -> Vec<Episode> {
        let mut entries: Vec<&EpisodeEntry> = ids
            .into_iter()
            .filter_map(|id| self.episodes.get(id))
            .collect();
        entries.sort_by(|a, b| b.time_key().cmp(&a.time_key()));
        entries.into_iter().map(EpisodeEntry::snapshot).collect()
    }

    /// Episodes with `start <= timestamp <= end`, newest first.
    pub fn retrieve_by_timeframe(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Episode> {
        if start > end {
            return Vec::new();
        }
        self.newest_first(
            self.by_time
                .range((start, 0)..=(end, u64::MAX))
                .map(|(_, id)| id),
        )
    }

    /// Episodes indexed under a context type, newest first.
    pub fn retrieve_by_context(&self, context_type: &str) -> Vec<Episode> {
        match self.by_context.get(context_type) {
            Some(ids) => self.newest_first(ids),
            None => Vec::new(),
        }
    }

    /// Episodes carrying any of `tags`, newest first.
    pub fn retrieve_by_tags(&self, tags: &Tags) -> Vec<Episode> {
        let ids: BTreeSet<&ItemId> = normalize_tags(tags)
            .iter()
            .filter_map(|t| self.by_tag.get(t))
            .flatten()
            .collect();
        self.newest_first(ids)
    }

    /// The `n` newest episodes, newest first.
    pub fn recent(&self, n: usize) -> Vec<Episode> {
        self.newest_first(self.by_time.values().rev().take(n))
    }

    pub fn get(&self, id: &ItemId) -> Option<Episode> {
        self.episodes.get(id).map(EpisodeEntry::snapshot)
    }

    pub fn remove(&mut self, id: &ItemId) -> Option<Episode> {
        self.remove_entry(id).map(|e| e.snapshot())
    }

    /// True when every index holds exactly the ids its keys imply.
    pub fn indices_consistent(&self) -> bool {
        if self.by_time.len() != self.episodes.len() {
            return false;
        }
        let time_ok = self.by_time.iter().all(|(key, id)| {
            self.episodes.get(id).is_some_and(|e| e.time_key() == *key)
        });
        let context_total: usize = self.by_context.values().map(BTreeSet::len).sum();
        let context_ok = context_total == self.episodes.len()
            && self.by_context.iter().all(|(ty, ids)| {
                ids.iter().all(|id| {
                    self.episodes
                        .get(id)
                        .is_some_and(|e| e.episode.context_type() == ty)
                })
            });
        let tag_total: usize = self.by_tag.values().map(BTreeSet::len).sum();
        let expected_tags: usize = self.episodes.values().map(|e| e.episode.tags.len()).sum();
        let tag_ok = tag_total == expected_tags
            && self.by_tag.iter().all(|(tag, ids)| {
                ids.iter().all(|id| {
                    self.episodes
                        .get(id)
                        .is_some_and(|e| e.episode.tags.contains(tag))
                })
            });
        time_ok && context_ok && tag_ok
    }
}

impl MemoryTier for EpisodeStore {
    fn tier(&self) -> Tier {
        Tier::Episodic
    }

    fn len(&self) -> usize {
        self.episodes.len()
    }

    fn capacity(&self) -> usize {
        self.config.max_episodes
    }

    fn average_strength(&self) -> f64 {
        if self.episodes.is_empty() {
            return 0.0;
        }
        self.episodes.values().map(|e| e.importance.get()).sum::<f64>() / self.episodes.len() as f64
    }

    fn contains(&self, id: &ItemId) -> bool {
        self.episodes.contains_key(id)
    }

    /// importance *= daily_decay^(hours / 24); episodes under `importance_threshold` are pruned.
    fn decay(&mut self, elapsed: Duration, now: DateTime<Utc>) -> Vec<ItemId> {
        let mut pending = Vec::new();
        for (id, entry) in &self.episodes {
            let days = hours(entry.access.decay_window(elapsed, now)) / 24.0;
            let importance = entry.importance.scale(self.config.daily_decay.powf(days));
            if importance < self.config.importance_threshold {
                pending.push(*id);
            }
        }
        for id in &pending {
            self.remove_entry(id);
        }
        if !pending.is_empty() {
            info!(removed = pending.len(), "episodes decayed below importance threshold");
        }
        pending
    }
}
