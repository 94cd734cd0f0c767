use serde::{Deserialize, Serialize};

/// Which working-memory buffer a piece of content belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Language: statements, definitions, conversation.
    Verbal,
    /// Places, layouts, diagrams.
    Spatial,
    /// Both verbal and spatial cues.
    Integrated,
    /// Plans, schedules, goals, things to do.
    Executive,
}

/// Strategy that labels content with a `ContentKind`.
pub trait ContentClassifier: Send + Sync {
    fn classify(&self, content: &str) -> ContentKind;
}

/// Cue-word classifier. Executive cues win; spatial plus verbal cues give `Integrated`.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    pub spatial_cues: Vec<String>,
    pub executive_cues: Vec<String>,
    pub verbal_cues: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            spatial_cues: owned(&[
                "where", "map", "building", "room", "campus", "location", "left", "right", "floor",
                "diagram", "layout", "near",
            ]),
            executive_cues: owned(&[
                "plan", "schedule", "deadline", "todo", "goal", "priority", "next", "step",
                "organize", "remind",
            ]),
            verbal_cues: owned(&[
                "said", "explain", "define", "meaning", "word", "read", "write", "essay", "told",
                "describe",
            ]),
        }
    }
}

impl KeywordClassifier {
    fn hits(cues: &[String], words: &[&str]) -> bool {
        words.iter().any(|w| cues.iter().any(|c| c == w))
    }
}

impl ContentClassifier for KeywordClassifier {
    fn classify(&self, content: &str) -> ContentKind {
        let lower = content.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if Self::hits(&self.executive_cues, &words) {
            return ContentKind::Executive;
        }
        let spatial = Self::hits(&self.spatial_cues, &words);
        let verbal = Self::hits(&self.verbal_cues, &words);
        match (spatial, verbal) {
            (true, true) => ContentKind::Integrated,
            (true, false) => ContentKind::Spatial,
            _ => ContentKind::Verbal,
        }
    }
}
