use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Unique identifier for an item in any tier (trace, episode, or concept).
pub type ItemId = Uuid;

/// Free-form structured context attached to stored items.
pub type Context = BTreeMap<String, serde_json::Value>;

/// Tag set attached to stored items.
pub type Tags = BTreeSet<String>;

/// The three memory tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Short-lived, capacity-bounded, fast-decaying traces.
    Working,
    /// Timestamped, tagged records of past interactions.
    Episodic,
    /// Long-lived concepts in an associative graph.
    Semantic,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Working, Tier::Episodic, Tier::Semantic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Working => "working",
            Tier::Episodic => "episodic",
            Tier::Semantic => "semantic",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a tag set from anything string-like.
pub fn tags<I, S>(items: I) -> Tags
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Read a context entry as a string, if it is one.
pub fn context_str<'a>(context: &'a Context, key: &str) -> Option<&'a str> {
    context.get(key).and_then(|v| v.as_str())
}
