use serde::{Deserialize, Serialize};

/// Root configuration, maps to `mnemo.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MnemoConfig {
    pub working: WorkingConfig,
    pub episodic: EpisodicConfig,
    pub semantic: SemanticConfig,
    pub coordinator: CoordinatorConfig,
    pub logging: LoggingConfig,
}

// ── Working tier ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingConfig {
    /// Maximum number of active traces. The oldest insertion is evicted past this.
    pub capacity: usize,
    /// Strength a new trace starts with.
    pub initial_strength: f64,
    /// Exponential decay rate per hour.
    pub decay_rate: f64,
    /// Strength added each time a trace is retrieved.
    pub access_boost: f64,
    /// Traces weaker than this are removed by decay.
    pub removal_floor: f64,
}

impl Default for WorkingConfig {
    fn default() -> Self {
        Self {
            capacity: 7,
            initial_strength: 0.8,
            decay_rate: 0.5,
            access_boost: 0.05,
            removal_floor: 0.1,
        }
    }
}

// ── Episodic tier ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodicConfig {
    /// Maximum number of episodes to retain.
    pub max_episodes: usize,
    /// Episodes whose importance decays below this are pruned.
    pub importance_threshold: f64,
    /// Importance multiplier per 24 hours.
    pub daily_decay: f64,
    /// Importance given to episodes stored without one.
    pub default_importance: f64,
    /// Importance added when an episode is recalled by similarity.
    pub access_boost: f64,
    /// Similarity weight for context key overlap.
    pub context_weight: f64,
    /// Similarity weight for tag overlap.
    pub tag_weight: f64,
    /// Similarity weight for content word overlap.
    pub content_weight: f64,
}

impl Default for EpisodicConfig {
    fn default() -> Self {
        Self {
            max_episodes: 1000,
            importance_threshold: 0.3,
            daily_decay: 0.95,
            default_importance: 0.5,
            access_boost: 0.02,
            context_weight: 0.4,
            tag_weight: 0.3,
            content_weight: 0.3,
        }
    }
}

// ── Semantic tier ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub initial_strength: f64,
    /// Keyword Jaccard overlap above which two concepts get an association.
    pub association_threshold: f64,
    /// Activation given to each concept that matches a query keyword.
    pub seed_activation: f64,
    /// Number of spreading-activation rounds.
    pub propagation_rounds: usize,
    /// Concepts fire (push activation to neighbours) only above this.
    pub firing_threshold: f64,
    /// Fraction of `activation * weight` pushed to each neighbour.
    pub spread_factor: f64,
    /// Maximum number of firing concepts per round.
    pub max_frontier: usize,
    /// Strength multiplier per 24 hours.
    pub daily_decay: f64,
    /// Decay protection earned per access.
    pub protection_per_access: f64,
    /// Upper bound on decay protection (0.5 = decays at half speed at most).
    pub max_protection: f64,
    pub removal_floor: f64,
    /// Maximum number of concepts; the weakest is evicted past this.
    pub max_concepts: usize,
    pub access_boost: f64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            initial_strength: 0.8,
            association_threshold: 0.2,
            seed_activation: 0.3,
            propagation_rounds: 3,
            firing_threshold: 0.1,
            spread_factor: 0.5,
            max_frontier: 500,
            daily_decay: 0.999,
            protection_per_access: 0.01,
            max_protection: 0.5,
            removal_floor: 0.1,
            max_concepts: 10_000,
            access_boost: 0.05,
        }
    }
}

// ── Coordinator ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Episodes more important than this purge matching working-tier traces on consolidation.
    pub consolidation_threshold: f64,
    /// Default relevance cutoff for retrieval.
    pub similarity_threshold: f64,
    /// Minimum seconds between decay sweeps.
    pub sweep_interval_secs: u64,
    /// Buffer size of the telemetry event bus.
    pub event_capacity: usize,
    /// Context values that mark an episode as worth summarising into the semantic tier.
    pub domain_rules: Vec<DomainRule>,
}

/// Matches episodes whose context `key` equals `value`; extracted concepts get `category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRule {
    pub key: String,
    pub value: String,
    pub category: String,
}

impl DomainRule {
    pub fn new(key: impl Into<String>, value: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            category: category.into(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            consolidation_threshold: 0.7,
            similarity_threshold: 0.6,
            sweep_interval_secs: 3600,
            event_capacity: 1024,
            domain_rules: ["academic", "research", "career", "wellbeing", "administrative"]
                .iter()
                .map(|d| DomainRule::new("domain", *d, *d))
                .collect(),
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "{} {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

/// Upper bound on `coordinator.sweep_interval_secs` (one year).
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 366 * 24 * 60 * 60;

fn unit_interval(warnings: &mut Vec<ConfigWarning>, field: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        warnings.push(ConfigWarning {
            field: field.into(),
            message: format!("{} is outside [0, 1]", value),
            severity: WarningSeverity::Error,
            hint: None,
        });
    }
}

impl MnemoConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Working tier ───
        if self.working.capacity == 0 {
            warnings.push(ConfigWarning {
                field: "working.capacity".into(),
                message: "capacity must be at least 1".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        } else if !(5..=9).contains(&self.working.capacity) {
            warnings.push(ConfigWarning {
                field: "working.capacity".into(),
                message: format!("capacity {} is unusual for working memory", self.working.capacity),
                severity: WarningSeverity::Warning,
                hint: Some("Typical values are 5 to 9".into()),
            });
        }
        unit_interval(&mut warnings, "working.initial_strength", self.working.initial_strength);
        unit_interval(&mut warnings, "working.access_boost", self.working.access_boost);
        unit_interval(&mut warnings, "working.removal_floor", self.working.removal_floor);
        if self.working.decay_rate < 0.0 {
            warnings.push(ConfigWarning {
                field: "working.decay_rate".into(),
                message: "decay rate must not be negative".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }

        // ── Episodic tier ───
        if self.episodic.max_episodes == 0 {
            warnings.push(ConfigWarning {
                field: "episodic.max_episodes".into(),
                message: "max_episodes must be at least 1".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }
        unit_interval(&mut warnings, "episodic.importance_threshold", self.episodic.importance_threshold);
        unit_interval(&mut warnings, "episodic.daily_decay", self.episodic.daily_decay);
        unit_interval(&mut warnings, "episodic.default_importance", self.episodic.default_importance);
        unit_interval(&mut warnings, "episodic.access_boost", self.episodic.access_boost);
        let weight_sum =
            self.episodic.context_weight + self.episodic.tag_weight + self.episodic.content_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            warnings.push(ConfigWarning {
                field: "episodic.*_weight".into(),
                message: format!("similarity weights sum to {:.3}, not 1.0", weight_sum),
                severity: WarningSeverity::Warning,
                hint: Some("Similarity scores may exceed 1.0 or never reach the threshold".into()),
            });
        }

        // ── Semantic tier ───
        unit_interval(&mut warnings, "semantic.initial_strength", self.semantic.initial_strength);
        unit_interval(&mut warnings, "semantic.association_threshold", self.semantic.association_threshold);
        unit_interval(&mut warnings, "semantic.daily_decay", self.semantic.daily_decay);
        unit_interval(&mut warnings, "semantic.max_protection", self.semantic.max_protection);
        unit_interval(&mut warnings, "semantic.removal_floor", self.semantic.removal_floor);
        unit_interval(&mut warnings, "semantic.access_boost", self.semantic.access_boost);
        if self.semantic.propagation_rounds == 0 {
            warnings.push(ConfigWarning {
                field: "semantic.propagation_rounds".into(),
                message: "at least one propagation round is required".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        } else if self.semantic.propagation_rounds > 10 {
            warnings.push(ConfigWarning {
                field: "semantic.propagation_rounds".into(),
                message: format!("{} rounds is expensive on dense graphs", self.semantic.propagation_rounds),
                severity: WarningSeverity::Warning,
                hint: Some("The default is 3".into()),
            });
        }
        if self.semantic.max_frontier == 0 {
            warnings.push(ConfigWarning {
                field: "semantic.max_frontier".into(),
                message: "max_frontier must be at least 1".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }
        if self.semantic.max_concepts == 0 {
            warnings.push(ConfigWarning {
                field: "semantic.max_concepts".into(),
                message: "max_concepts must be at least 1".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }

        // ── Coordinator ───
        unit_interval(
            &mut warnings,
            "coordinator.consolidation_threshold",
            self.coordinator.consolidation_threshold,
        );
        unit_interval(
            &mut warnings,
            "coordinator.similarity_threshold",
            self.coordinator.similarity_threshold,
        );
        if self.coordinator.sweep_interval_secs > MAX_SWEEP_INTERVAL_SECS {
            warnings.push(ConfigWarning {
                field: "coordinator.sweep_interval_secs".into(),
                message: format!(
                    "{} seconds exceeds the maximum of {}",
                    self.coordinator.sweep_interval_secs, MAX_SWEEP_INTERVAL_SECS
                ),
                severity: WarningSeverity::Error,
                hint: Some("The default is 3600 (hourly)".into()),
            });
        }
        if self.coordinator.domain_rules.is_empty() {
            warnings.push(ConfigWarning {
                field: "coordinator.domain_rules".into(),
                message: "no domain rules; only successful outcomes will be consolidated".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
