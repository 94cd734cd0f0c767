#[cfg(test)]
mod tests {
    use mnemo_config::schema::*;
    use mnemo_config::{ConfigLoader, init_tracing};
    use std::io::Write;

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_working_config_defaults() {
        let config = WorkingConfig::default();
        assert_eq!(config.capacity, 7);
        assert_eq!(config.initial_strength, 0.8);
        assert_eq!(config.removal_floor, 0.1);
        assert_eq!(config.access_boost, 0.05);
    }

    #[test]
    fn test_episodic_config_defaults() {
        let config = EpisodicConfig::default();
        assert_eq!(config.importance_threshold, 0.3);
        assert_eq!(config.daily_decay, 0.95);
        assert_eq!(config.context_weight, 0.4);
        assert_eq!(config.tag_weight, 0.3);
        assert_eq!(config.content_weight, 0.3);
    }

    #[test]
    fn test_semantic_config_defaults() {
        let config = SemanticConfig::default();
        assert_eq!(config.propagation_rounds, 3);
        assert_eq!(config.seed_activation, 0.3);
        assert_eq!(config.association_threshold, 0.2);
        assert_eq!(config.max_frontier, 500);
        assert_eq!(config.daily_decay, 0.999);
    }

    #[test]
    fn test_coordinator_config_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.consolidation_threshold, 0.7);
        assert_eq!(config.similarity_threshold, 0.6);
        assert_eq!(config.sweep_interval_secs, 3600);
        assert!(config
            .domain_rules
            .contains(&DomainRule::new("domain", "research", "research")));
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "pretty");
    }

    // ── TOML roundtrip tests ───────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = MnemoConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: MnemoConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.working.capacity, config.working.capacity);
        assert_eq!(restored.semantic.max_frontier, config.semantic.max_frontier);
        assert_eq!(restored.coordinator.domain_rules, config.coordinator.domain_rules);
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
[working]
capacity = 5

[semantic]
propagation_rounds = 2
"#;
        let config: MnemoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.working.capacity, 5);
        assert_eq!(config.semantic.propagation_rounds, 2);
        // Defaults should fill in
        assert_eq!(config.working.decay_rate, 0.5);
        assert_eq!(config.episodic.max_episodes, 1000);
        assert_eq!(config.coordinator.consolidation_threshold, 0.7);
    }

    #[test]
    fn test_domain_rules_deserialize() {
        let toml_str = r#"
[[coordinator.domain_rules]]
key = "course"
value = "cs101"
category = "programming"
"#;
        let config: MnemoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.coordinator.domain_rules.len(), 1);
        assert_eq!(config.coordinator.domain_rules[0].category, "programming");
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_default_config_is_valid() {
        let warnings = MnemoConfig::default().validate().unwrap();
        assert!(warnings.iter().all(|w| w.severity != WarningSeverity::Error));
    }

    #[test]
    fn test_zero_capacity_is_error() {
        let mut config = MnemoConfig::default();
        config.working.capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("working.capacity"));
    }

    #[test]
    fn test_unusual_capacity_is_warning() {
        let mut config = MnemoConfig::default();
        config.working.capacity = 20;
        let warnings = config.validate().unwrap();
        assert!(warnings
            .iter()
            .any(|w| w.field == "working.capacity" && w.severity == WarningSeverity::Warning));
    }

    #[test]
    fn test_fraction_out_of_range_is_error() {
        let mut config = MnemoConfig::default();
        config.coordinator.consolidation_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.contains("coordinator.consolidation_threshold"));
    }

    #[test]
    fn test_sweep_interval_above_max_is_error() {
        let mut config = MnemoConfig::default();
        config.coordinator.sweep_interval_secs = MAX_SWEEP_INTERVAL_SECS;
        assert!(config.validate().is_ok());
        config.coordinator.sweep_interval_secs = 10_u64.pow(16);
        let err = config.validate().unwrap_err();
        assert!(err.contains("coordinator.sweep_interval_secs"));
    }

    #[test]
    fn test_zero_rounds_is_error() {
        let mut config = MnemoConfig::default();
        config.semantic.propagation_rounds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_weights_not_summing_to_one_warns() {
        let mut config = MnemoConfig::default();
        config.episodic.content_weight = 0.6;
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "episodic.*_weight"));
    }

    #[test]
    fn test_unknown_log_format_warns() {
        let mut config = MnemoConfig::default();
        config.logging.format = "xml".into();
        let warnings = config.validate().unwrap();
        let w = warnings.iter().find(|w| w.field == "logging.format").unwrap();
        assert!(w.to_string().contains("xml"));
        assert!(w.hint.is_some());
    }

    // ── ConfigLoader tests ─────────────────────────────────────

    #[test]
    fn test_config_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("mnemo.toml");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(
            f,
            r#"
[working]
capacity = 9

[episodic]
max_episodes = 250

[logging]
format = "json"
"#
        )
        .unwrap();

        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        let config = loader.get();
        assert_eq!(config.working.capacity, 9);
        assert_eq!(config.episodic.max_episodes, 250);
        assert_eq!(config.logging.format, "json");
        assert_eq!(loader.path(), config_path.as_path());
    }

    #[test]
    fn test_config_loader_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("absent.toml");
        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        assert_eq!(loader.get().semantic.propagation_rounds, 3);
    }

    #[test]
    fn test_config_loader_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("mnemo.toml");
        std::fs::write(&config_path, "[semantic]\nmax_frontier = 0\n").unwrap();
        let result = ConfigLoader::load(Some(config_path.as_path()));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_loader_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("mnemo.toml");
        std::fs::write(&config_path, "[working\ncapacity = ").unwrap();
        let err = ConfigLoader::load(Some(config_path.as_path())).err().unwrap();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_config_loader_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("mnemo.toml");

        std::fs::write(&config_path, "[working]\ncapacity = 6\n").unwrap();
        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        assert_eq!(loader.get().working.capacity, 6);

        std::fs::write(&config_path, "[working]\ncapacity = 8\n").unwrap();
        loader.reload().unwrap();
        assert_eq!(loader.get().working.capacity, 8);
        assert_eq!(loader.shared().read().working.capacity, 8);
    }

    #[test]
    fn test_config_loader_reload_keeps_config_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("mnemo.toml");

        std::fs::write(&config_path, "[working]\ncapacity = 6\n").unwrap();
        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();

        std::fs::write(&config_path, "[working]\ncapacity = 0\n").unwrap();
        assert!(loader.reload().is_err());
        assert_eq!(loader.get().working.capacity, 6);
    }

    // ── Logging ────────────────────────────────────────────────

    #[test]
    fn test_init_tracing_only_once() {
        let config = LoggingConfig {
            level: "debug".into(),
            format: "compact".into(),
        };
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_err());
    }

    // ── JSON roundtrip ─────────────────────────────────────────

    #[test]
    fn test_config_json_roundtrip() {
        let config = MnemoConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: MnemoConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.episodic.max_episodes, config.episodic.max_episodes);
        assert_eq!(restored.logging.level, "info");
    }
}
