use chrono::{DateTime, Duration, Utc};
use mnemo_config::SemanticConfig;
use mnemo_core::{
    Clock, Context, ItemId, MnemoError, Result, StopWordTokenizer, SystemClock, Tags, Tier,
    Tokenizer, context_str,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::query::MemoryQuery;
use crate::salience::{AccessStats, Salience, clamp_unit, hours};
use crate::similarity::{jaccard, normalize_tags};
use crate::tier::MemoryTier;

/// Context key naming a concept's category.
pub const CATEGORY_KEY: &str = "category";
pub const DEFAULT_CATEGORY: &str = "general";

/// A point-in-time view of a concept node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub id: ItemId,
    pub content: String,
    pub keywords: BTreeSet<String>,
    pub category: String,
    pub strength: f64,
    pub access_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Neighbours and edge weights in (0, 1].
    pub associations: Vec<(ItemId, f64)>,
}

/// A concept reached by spreading activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivatedConcept {
    pub concept: Concept,
    pub activation: f64,
}

/// Result of storing a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredConcept {
    pub id: ItemId,
    /// Weakest concept removed to stay within `max_concepts`.
    pub evicted: Option<ItemId>,
    /// Association edges created for the new concept.
    pub associations: usize,
    /// True when a concept with identical content already existed.
    pub existing: bool,
}

type Slot = usize;

struct Node {
    id: ItemId,
    content: String,
    keywords: BTreeSet<String>,
    category: String,
    strength: Salience,
    access: AccessStats,
    created_at: DateTime<Utc>,
    edges: Vec<(Slot, f64)>,
}

impl Node {
    fn access(&self, boost: f64, now: DateTime<Utc>) {
        self.strength.bump(boost);
        self.access.record(now);
    }
}

/// Semantic memory: concepts in an arena, linked by symmetric weighted edges.
///
/// Nodes live in a slot vector and refer to each other by slot index. Freed
/// slots are recycled, so removal always strips the slot from every
/// neighbour's adjacency list first.
pub struct AssociativeGraph {
    config: SemanticConfig,
    slots: Vec<Option<Node>>,
    free: Vec<Slot>,
    index: HashMap<ItemId, Slot>,
    by_content: HashMap<String, Slot>,
    by_keyword: HashMap<String, BTreeSet<Slot>>,
    tokenizer: Arc<dyn Tokenizer>,
    clock: Arc<dyn Clock>,
}

impl AssociativeGraph {
    pub fn new(config: SemanticConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            by_content: HashMap::new(),
            by_keyword: HashMap::new(),
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

    fn node(&self, slot: Slot) -> Option<&Node> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, slot: Slot) -> Option<&mut Node> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    fn live(&self) -> impl Iterator<Item = (Slot, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, node)| node.as_ref().map(|n| (slot, n)))
    }

    /// Store a concept, extracting keywords from `content` and adding `tags` to them.
    ///
    /// The category comes from the context's `"category"` entry.
    pub fn store_concept(&mut self, content: &str, context: &Context, tags: &Tags) -> Result<StoredConcept> {
        let mut keywords = self.tokenizer.tokenize(content);
        keywords.extend(normalize_tags(tags));
        let category = context_str(context, CATEGORY_KEY).unwrap_or(DEFAULT_CATEGORY);
        self.store_concept_with_keywords(content, keywords, category)
    }

    /// Store a concept with a caller-supplied keyword set.
    ///
    /// Every existing concept whose keyword Jaccard overlap with the new one exceeds
    /// `association_threshold` gets a symmetric edge weighted by that overlap.
    pub fn store_concept_with_keywords(
        &mut self,
        content: &str,
        keywords: BTreeSet<String>,
        category: &str,
    ) -> Result<StoredConcept> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MnemoError::InvalidContent("concept content is empty".into()));
        }
        let now = self.clock.now();

        if let Some(&slot) = self.by_content.get(content) {
            if let Some(node) = self.node(slot) {
                node.access(self.config.access_boost, now);
                debug!(id = %node.id, "concept already known, reinforced");
                return Ok(StoredConcept {
                    id: node.id,
                    evicted: None,
                    associations: 0,
                    existing: true,
                });
            }
        }

        let evicted = if self.index.len() >= self.config.max_concepts {
            self.evict_weakest()
        } else {
            None
        };

        let candidates: BTreeSet<Slot> = keywords
            .iter()
            .filter_map(|k| self.by_keyword.get(k))
            .flatten()
            .copied()
            .collect();
        let edges: Vec<(Slot, f64)> = candidates
            .into_iter()
            .filter_map(|other| {
                let overlap = jaccard(&keywords, &self.node(other)?.keywords);
                (overlap > self.config.association_threshold).then_some((other, overlap))
            })
            .collect();

        let id = Uuid::new_v4();
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        for keyword in &keywords {
            self.by_keyword.entry(keyword.clone()).or_default().insert(slot);
        }
        for &(other, weight) in &edges {
            if let Some(neighbour) = self.node_mut(other) {
                neighbour.edges.push((slot, weight));
            }
        }
        self.slots[slot] = Some(Node {
            id,
            content: content.to_string(),
            keywords,
            category: category.to_string(),
            strength: Salience::new(self.config.initial_strength),
            access: AccessStats::new(now),
            created_at: now,
            edges: edges.clone(),
        });
        self.index.insert(id, slot);
        self.by_content.insert(content.to_string(), slot);

        debug!(%id, associations = edges.len(), category, "stored concept");
        Ok(StoredConcept {
            id,
            evicted,
            associations: edges.len(),
            existing: false,
        })
    }

    fn evict_weakest(&mut self) -> Option<ItemId> {
        let (slot, id) = self
            .live()
            .min_by(|(_, a), (_, b)| {
                a.strength
                    .get()
                    .total_cmp(&b.strength.get())
                    .then(a.created_at.cmp(&b.created_at))
            })
            .map(|(slot, n)| (slot, n.id))?;
        self.remove_slot(slot);
        info!(%id, max = self.config.max_concepts, "semantic memory full, evicted weakest concept");
        Some(id)
    }

    /// Take a node out of the arena, cascading to its neighbours and every index.
    fn remove_slot(&mut self, slot: Slot) -> Option<Node> {
        let node = self.slots.get_mut(slot)?.take()?;
        for &(other, _) in &node.edges {
            if let Some(neighbour) = self.node_mut(other) {
                neighbour.edges.retain(|(s, _)| *s != slot);
            }
        }
        for keyword in &node.keywords {
            if let Some(slots) = self.by_keyword.get_mut(keyword) {
                slots.remove(&slot);
                if slots.is_empty() {
                    self.by_keyword.remove(keyword);
                }
            }
        }
        self.index.remove(&node.id);
        self.by_content.remove(&node.content);
        self.free.push(slot);
        Some(node)
    }

    fn slot_of(&self, id: &ItemId) -> Result<Slot> {
        self.index.get(id).copied().ok_or(MnemoError::UnknownId(*id))
    }

    /// Create or update a symmetric association. The weight is clamped to (0, 1].
    pub fn associate(&mut self, a: &ItemId, b: &ItemId, weight: f64) -> Result<()> {
        let sa = self.slot_of(a)?;
        let sb = self.slot_of(b)?;
        if sa == sb {
            return Err(MnemoError::InvalidContent(
                "a concept cannot be associated with itself".into(),
            ));
        }
        let weight = clamp_unit(weight);
        if weight == 0.0 {
            return Err(MnemoError::InvalidContent(
                "association weight must be positive".into(),
            ));
        }
        self.set_edge(sa, sb, weight);
        self.set_edge(sb, sa, weight);
        Ok(())
    }

    fn set_edge(&mut self, from: Slot, to: Slot, weight: f64) {
        if let Some(node) = self.node_mut(from) {
            match node.edges.iter_mut().find(|(s, _)| *s == to) {
                Some(edge) => edge.1 = weight,
                None => node.edges.push((to, weight)),
            }
        }
    }

    /// Neighbours of a concept with edge weights.
    pub fn associations(&self, id: &ItemId) -> Result<Vec<(ItemId, f64)>> {
        let slot = self.slot_of(id)?;
        Ok(self.neighbours(slot))
    }

    fn neighbours(&self, slot: Slot) -> Vec<(ItemId, f64)> {
        self.node(slot)
            .map(|n| {
                n.edges
                    .iter()
                    .filter_map(|&(s, w)| self.node(s).map(|other| (other.id, w)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn snapshot(&self, slot: Slot) -> Option<Concept> {
        let node = self.node(slot)?;
        Some(Concept {
            id: node.id,
            content: node.content.clone(),
            keywords: node.keywords.clone(),
            category: node.category.clone(),
            strength: node.strength.get(),
            access_count: node.access.count(),
            created_at: node.created_at,
            last_accessed_at: node.access.last_accessed(),
            associations: self.neighbours(slot),
        })
    }

    /// Spreading-activation recall.
    ///
    /// Concepts matching a query keyword (or tag) start at `seed_activation`. Each
    /// round, every concept above `firing_threshold` (at most `max_frontier` of them,
    /// strongest first) adds `activation * weight * spread_factor` to each neighbour,
    /// computed from the activations at the start of the round. After
    /// `propagation_rounds` rounds, concepts at or above `threshold` are returned,
    /// most activated first, and each counts as accessed.
    pub fn retrieve(&self, query: &MemoryQuery, threshold: f64) -> Vec<ActivatedConcept> {
        let mut keywords = self.tokenizer.tokenize(&query.text);
        keywords.extend(normalize_tags(&query.tags));

        let mut activation: HashMap<Slot, f64> = keywords
            .iter()
            .filter_map(|k| self.by_keyword.get(k))
            .flatten()
            .map(|&slot| (slot, self.config.seed_activation))
            .collect();
        if activation.is_empty() {
            return Vec::new();
        }

        for _ in 0..self.config.propagation_rounds {
            let mut frontier: Vec<(Slot, f64)> = activation
                .iter()
                .filter(|(_, a)| **a > self.config.firing_threshold)
                .map(|(&s, &a)| (s, a))
                .collect();
            if frontier.is_empty() {
                break;
            }
            frontier.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            frontier.truncate(self.config.max_frontier);

            let mut pushes: Vec<(Slot, f64)> = Vec::new();
            for (slot, a) in frontier {
                if let Some(node) = self.node(slot) {
                    pushes.extend(
                        node.edges
                            .iter()
                            .map(|&(nbr, w)| (nbr, a * w * self.config.spread_factor)),
                    );
                }
            }
            for (slot, amount) in pushes {
                *activation.entry(slot).or_insert(0.0) += amount;
            }
        }

        let now = self.clock.now();
        let mut hits: Vec<(Slot, f64)> = activation
            .into_iter()
            .filter(|(_, a)| *a >= threshold)
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        debug!(activated = hits.len(), "spreading activation retrieval");

        hits.into_iter()
            .filter_map(|(slot, activation)| {
                self.node(slot)?.access(self.config.access_boost, now);
                Some(ActivatedConcept {
                    concept: self.snapshot(slot)?,
                    activation,
                })
            })
            .collect()
    }

    pub fn get(&self, id: &ItemId) -> Option<Concept> {
        self.index.get(id).and_then(|&slot| self.snapshot(slot))
    }

    /// Remove a concept and every association that points at it.
    pub fn remove(&mut self, id: &ItemId) -> Option<Concept> {
        let slot = *self.index.get(id)?;
        let concept = self.snapshot(slot);
        self.remove_slot(slot);
        concept
    }

    pub fn by_category(&self, category: &str) -> Vec<Concept> {
        self.live()
            .filter(|(_, n)| n.category == category)
            .filter_map(|(slot, _)| self.snapshot(slot))
            .collect()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.live().map(|(_, n)| n.id).collect()
    }

    /// True when every edge (A, B, w) has its mirror (B, A, w) and no edge dangles.
    pub fn associations_symmetric(&self) -> bool {
        self.live().all(|(slot, node)| {
            node.edges.iter().all(|&(other, w)| {
                self.node(other).is_some_and(|n| {
                    n.edges.iter().any(|&(back, bw)| back == slot && bw == w)
                })
            })
        })
    }
}

impl MemoryTier for AssociativeGraph {
    fn tier(&self) -> Tier {
        Tier::Semantic
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn capacity(&self) -> usize {
        self.config.max_concepts
    }

    fn average_strength(&self) -> f64 {
        if self.index.is_empty() {
            return 0.0;
        }
        self.live().map(|(_, n)| n.strength.get()).sum::<f64>() / self.index.len() as f64
    }

    fn contains(&self, id: &ItemId) -> bool {
        self.index.contains_key(id)
    }

    /// strength *= daily_decay^(days * (1 - protection)), where protection grows with
    /// access count up to `max_protection`. Removal cascades to all associations.
    fn decay(&mut self, elapsed: Duration, now: DateTime<Utc>) -> Vec<ItemId> {
        let mut pending = Vec::new();
        for (slot, node) in self.live() {
            let days = hours(node.access.decay_window(elapsed, now)) / 24.0;
            let protection = (node.access.count() as f64 * self.config.protection_per_access)
                .min(self.config.max_protection);
            let strength = node
                .strength
                .scale(self.config.daily_decay.powf(days * (1.0 - protection)));
            if strength < self.config.removal_floor {
                pending.push((slot, node.id));
            }
        }
        for &(slot, _) in &pending {
            self.remove_slot(slot);
        }
        if !pending.is_empty() {
            info!(removed = pending.len(), "concepts decayed away");
        }
        pending.into_iter().map(|(_, id)| id).collect()
    }
}
