// src/config.rs
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::source::{CompiledSource, SourceSpec};

const ENV_PATH: &str = "WATCHER_CONFIG_PATH";

fn default_check_interval_secs() -> u64 {
    300
}
fn default_warmup_delay_secs() -> u64 {
    15
}
fn default_pacing_delay_ms() -> u64 {
    2_500
}
fn default_fetch_timeout_secs() -> u64 {
    12
}
fn default_context_chars() -> usize {
    100
}
fn default_max_per_pattern() -> usize {
    5
}
fn default_dedup_capacity() -> usize {
    crate::dedup::DEFAULT_CAPACITY
}
fn default_state_path() -> PathBuf {
    PathBuf::from("state/dedup.json")
}

/// Everything the pipeline consumes: pacing, caps, the dedup capacity, and
/// the watched sources themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Startup grace period so notification transports finish connecting
    /// before the first cycle fires.
    #[serde(default = "default_warmup_delay_secs")]
    pub warmup_delay_secs: u64,
    /// Delay between consecutive sources within one cycle.
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
    #[serde(default = "default_max_per_pattern")]
    pub max_per_pattern: usize,
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        // serde defaults and Default must agree; an empty TOML document is
        // the canonical way to get them.
        toml::from_str("").expect("empty config parses")
    }
}

impl WatcherConfig {
    /// Load from an explicit path. TOML or JSON, by extension with content
    /// fallback.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_config(&content, &ext)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $WATCHER_CONFIG_PATH
    /// 2) config/sources.toml
    /// 3) config/sources.json
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("WATCHER_CONFIG_PATH points to non-existent path"));
        }
        let toml_p = PathBuf::from("config/sources.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/sources.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        let mut cfg = Self::default();
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Derive missing ids/display names and reject broken source lists.
    pub fn normalize_and_validate(&mut self) -> Result<()> {
        let mut seen = HashSet::new();
        for source in &mut self.sources {
            source.normalize();
            if source.location.trim().is_empty() {
                bail!("source {:?} has an empty location", source.id);
            }
            if source.patterns.is_empty() {
                bail!("source {:?} has no patterns", source.id);
            }
            if !seen.insert(source.id.clone()) {
                bail!("duplicate source id {:?}", source.id);
            }
        }
        if self.dedup_capacity == 0 {
            bail!("dedup_capacity must be at least 1");
        }
        Ok(())
    }

    /// Compile every source's patterns once, at startup.
    pub fn compile_sources(&self) -> Result<Vec<CompiledSource>> {
        self.sources
            .iter()
            .cloned()
            .map(CompiledSource::compile)
            .collect()
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn warmup_delay(&self) -> Duration {
        Duration::from_secs(self.warmup_delay_secs)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<WatcherConfig> {
    let try_toml = hint_ext == "toml" || !s.trim_start().starts_with('{');
    if try_toml {
        if let Ok(v) = toml::from_str(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = serde_json::from_str(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = toml::from_str(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported config format"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PatternSpec;

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = WatcherConfig::default();
        assert_eq!(cfg.check_interval_secs, 300);
        assert_eq!(cfg.context_chars, 100);
        assert_eq!(cfg.max_per_pattern, 5);
        assert_eq!(cfg.dedup_capacity, 100);
        assert_eq!(cfg.state_path, PathBuf::from("state/dedup.json"));
        assert!(cfg.sources.is_empty());
    }

    #[test]
    fn toml_sources_parse_with_literal_and_regex_patterns() {
        let toml = r#"
            check_interval_secs = 120

            [[sources]]
            display_name = "Diário Oficial"
            location = "https://consaude.org.br/diario-oficial/"
            patterns = ["EDIÇÃO:", { regex = 'Edi[cç][aã]o\s+n' }]
        "#;
        let mut cfg = parse_config(toml, "toml").unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.check_interval_secs, 120);
        assert_eq!(cfg.sources.len(), 1);
        let src = &cfg.sources[0];
        assert_eq!(src.id, "consaude-org-br-diario-oficial");
        assert_eq!(src.patterns.len(), 2);
        assert!(matches!(src.patterns[0], PatternSpec::Literal(_)));
        assert!(matches!(src.patterns[1], PatternSpec::Regex { .. }));
        cfg.compile_sources().unwrap();
    }

    #[test]
    fn json_config_is_accepted() {
        let json = r#"{
            "sources": [
                {
                    "id": "concurso",
                    "location": "https://example.org/concursos",
                    "patterns": ["Edital de Convocação", "ERRATA"]
                }
            ]
        }"#;
        let mut cfg = parse_config(json, "json").unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.sources[0].id, "concurso");
        assert_eq!(cfg.sources[0].display_name, "concurso");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut cfg = WatcherConfig::default();
        for _ in 0..2 {
            cfg.sources.push(SourceSpec {
                id: "same".into(),
                display_name: String::new(),
                location: "https://example.org/a".into(),
                patterns: vec![PatternSpec::Literal("x".into())],
            });
        }
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn patternless_sources_are_rejected() {
        let mut cfg = WatcherConfig::default();
        cfg.sources.push(SourceSpec {
            id: "empty".into(),
            display_name: String::new(),
            location: "https://example.org/a".into(),
            patterns: vec![],
        });
        assert!(cfg.normalize_and_validate().is_err());
    }
}
