use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::models::{RegionCode, SignalKind, SourceType};

/// Built-in tables, used when no config file is found.
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Configuration format understood by this build.
pub const CONFIG_VERSION: u32 = 1;

/// Configuration problems. These are the only fatal errors of a run and are
/// raised before any model is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unsupported configuration version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("{table} entry '{key}' maps to UNKNOWN; only concrete regions are allowed")]
    UnknownRegionTarget { table: &'static str, key: String },

    #[error("{table} contains an empty entry")]
    EmptyEntry { table: &'static str },

    #[error("confidence for {source_type} must be within [0, 1], got {value}")]
    InvalidConfidence { source_type: SourceType, value: f64 },

    #[error("traffic thresholds must satisfy 0 <= orange <= green <= 1 (orange = {orange}, green = {green})")]
    InvalidThresholds { orange: f64, green: f64 },

    #[error("duplicate section '{0}'")]
    DuplicateSection(String),

    #[error("duplicate field '{field}' in section '{section}'")]
    DuplicateField { section: String, field: String },

    #[error("field '{section}.{field}' has neither labels nor a pattern")]
    UnmatchableField { section: String, field: String },

    #[error("invalid pattern for {context}: {source}")]
    InvalidPattern {
        context: String,
        #[source]
        source: regex::Error,
    },
}

/// Root configuration, deserialized from `.transparency-checkr/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Region detection tables.
    pub region: RegionConfig,
    /// Source confidence and trusted domains.
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub size: SizeConfig,
    /// Per-section field schemas, in report order.
    #[serde(default)]
    pub sections: Vec<SectionSchema>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    /// Regions trailing the leader by less than this many points are tied with it.
    #[serde(default = "default_tie_threshold")]
    pub tie_threshold: u32,
    /// Regions scoring above this, other than the resolved one, are kept as secondary.
    #[serde(default)]
    pub presence_threshold: u32,
    #[serde(default)]
    pub weights: SignalWeights,
    /// Host suffix (`.co.uk`) → region.
    #[serde(default)]
    pub domains: BTreeMap<String, RegionCode>,
    /// Regulation term → region.
    #[serde(default)]
    pub regulations: BTreeMap<String, RegionCode>,
    /// Legal-form suffix → region.
    #[serde(default)]
    pub entity_suffixes: BTreeMap<String, RegionCode>,
    /// Country/city → region.
    #[serde(default)]
    pub places: BTreeMap<String, RegionCode>,
    /// Provider name → documented headquarters region.
    #[serde(default)]
    pub known_providers: BTreeMap<String, RegionCode>,
    #[serde(default)]
    pub headquarters_phrases: Vec<String>,
    #[serde(default)]
    pub deployment_phrases: Vec<String>,
    #[serde(default)]
    pub jurisdiction_phrases: Vec<String>,
}

fn default_tie_threshold() -> u32 {
    1
}

impl RegionConfig {
    /// Look up the override region for a provider.
    ///
    /// Matching is case-insensitive on whitespace-normalized names; a provider
    /// also matches a key it starts with (`"Google DeepMind"` → `"google"`).
    /// The longest matching key wins.
    pub fn known_provider(&self, provider: &str) -> Option<RegionCode> {
        let name = normalize_name(provider);
        if name.is_empty() {
            return None;
        }

        self.known_providers
            .iter()
            .map(|(key, region)| (normalize_name(key), *region))
            .filter(|(key, _)| {
                !key.is_empty() && (name == *key || name.starts_with(&format!("{} ", key)))
            })
            .max_by_key(|(key, _)| key.len())
            .map(|(_, region)| region)
    }
}

/// Weight attached to each signal kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub domain: u32,
    pub headquarters: u32,
    pub regulatory: u32,
    pub entity_suffix: u32,
    pub deployment: u32,
    pub other: u32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        SignalWeights {
            domain: 10,
            headquarters: 5,
            regulatory: 3,
            entity_suffix: 2,
            deployment: 1,
            other: 1,
        }
    }
}

impl SignalWeights {
    pub fn weight(&self, kind: SignalKind) -> u32 {
        match kind {
            SignalKind::Domain => self.domain,
            SignalKind::Headquarters => self.headquarters,
            SignalKind::Regulatory => self.regulatory,
            SignalKind::EntitySuffix => self.entity_suffix,
            SignalKind::Deployment => self.deployment,
            SignalKind::Other => self.other,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub confidence: ConfidenceTable,
    /// Checked in order; the first list containing the host wins.
    #[serde(default)]
    pub trusted_domains: Vec<TrustedDomains>,
}

/// Confidence attached to fields extracted from each source type.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfidenceTable {
    pub official_api: f64,
    pub official_docs: f64,
    pub official_newsroom: f64,
    pub huggingface: f64,
    pub arxiv: f64,
    pub github: f64,
    pub tech_news: f64,
    pub general_web: f64,
}

impl Default for ConfidenceTable {
    fn default() -> Self {
        ConfidenceTable {
            official_api: 1.0,
            official_docs: 0.95,
            official_newsroom: 0.9,
            huggingface: 0.85,
            arxiv: 0.8,
            github: 0.75,
            tech_news: 0.6,
            general_web: 0.4,
        }
    }
}

impl ConfidenceTable {
    pub fn get(&self, source_type: SourceType) -> f64 {
        match source_type {
            SourceType::OfficialApi => self.official_api,
            SourceType::OfficialDocs => self.official_docs,
            SourceType::OfficialNewsroom => self.official_newsroom,
            SourceType::Huggingface => self.huggingface,
            SourceType::Arxiv => self.arxiv,
            SourceType::Github => self.github,
            SourceType::TechNews => self.tech_news,
            SourceType::GeneralWeb => self.general_web,
        }
    }

    fn entries(&self) -> [(SourceType, f64); 8] {
        [
            SourceType::OfficialApi,
            SourceType::OfficialDocs,
            SourceType::OfficialNewsroom,
            SourceType::Huggingface,
            SourceType::Arxiv,
            SourceType::Github,
            SourceType::TechNews,
            SourceType::GeneralWeb,
        ]
        .map(|t| (t, self.get(t)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrustedDomains {
    pub source_type: SourceType,
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Minimum overall share (0..=1) for a green light.
    pub green: f64,
    /// Minimum overall share (0..=1) for an orange light.
    pub orange: f64,
    /// Providers that signed the EU code of practice.
    pub signatories: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            green: 0.8,
            orange: 0.4,
            signatories: Vec::new(),
        }
    }
}

impl ScoringConfig {
    pub fn is_signatory(&self, provider: &str) -> bool {
        let name = normalize_name(provider);
        self.signatories.iter().any(|s| normalize_name(s) == name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SizeConfig {
    /// Parameter count (in billions) from which a model counts as Big.
    pub big_threshold_billions: f64,
    pub big_name_markers: Vec<String>,
    pub small_name_markers: Vec<String>,
}

impl Default for SizeConfig {
    fn default() -> Self {
        SizeConfig {
            big_threshold_billions: 175.0,
            big_name_markers: Vec::new(),
            small_name_markers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionSchema {
    pub key: String,
    /// Enhanced-transparency section: full completion earns a bonus star.
    #[serde(default)]
    pub bonus: bool,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    /// Labels introducing the value (`label: value` or a heading line).
    #[serde(default)]
    pub labels: Vec<String>,
    /// Case-insensitive fallback regex. A `value` group narrows the match;
    /// other named groups become attributes of structured values.
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default)]
    pub kind: FieldKind,
}

fn default_min_length() -> usize {
    20
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    List,
    KeyValue,
    Structured,
}

impl Config {
    /// Parse the built-in tables.
    pub fn builtin() -> Result<Config, ConfigError> {
        Ok(toml::from_str(DEFAULT_CONFIG)?)
    }

    /// Reject tables that cannot produce a meaningful result.
    ///
    /// Regex patterns are checked when the matchers are compiled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                expected: CONFIG_VERSION,
            });
        }

        let region = &self.region;
        let tables: [(&'static str, &BTreeMap<String, RegionCode>); 5] = [
            ("region.domains", &region.domains),
            ("region.regulations", &region.regulations),
            ("region.entity_suffixes", &region.entity_suffixes),
            ("region.places", &region.places),
            ("region.known_providers", &region.known_providers),
        ];
        for (table, entries) in tables {
            for (key, target) in entries {
                if key.trim().is_empty() {
                    return Err(ConfigError::EmptyEntry { table });
                }
                if *target == RegionCode::Unknown {
                    return Err(ConfigError::UnknownRegionTarget {
                        table,
                        key: key.clone(),
                    });
                }
            }
        }

        let phrase_lists: [(&'static str, &Vec<String>); 3] = [
            ("region.headquarters_phrases", &region.headquarters_phrases),
            ("region.deployment_phrases", &region.deployment_phrases),
            ("region.jurisdiction_phrases", &region.jurisdiction_phrases),
        ];
        for (table, phrases) in phrase_lists {
            if phrases.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::EmptyEntry { table });
            }
        }

        for (source_type, value) in self.sources.confidence.entries() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidConfidence { source_type, value });
            }
        }
        if self
            .sources
            .trusted_domains
            .iter()
            .flat_map(|t| &t.domains)
            .any(|d| d.trim().is_empty())
        {
            return Err(ConfigError::EmptyEntry {
                table: "sources.trusted_domains",
            });
        }

        let scoring = &self.scoring;
        if !(0.0..=1.0).contains(&scoring.orange)
            || !(0.0..=1.0).contains(&scoring.green)
            || scoring.orange > scoring.green
        {
            return Err(ConfigError::InvalidThresholds {
                orange: scoring.orange,
                green: scoring.green,
            });
        }

        let mut section_keys = HashSet::new();
        for section in &self.sections {
            if section.key.trim().is_empty() {
                return Err(ConfigError::EmptyEntry { table: "sections" });
            }
            if !section_keys.insert(section.key.as_str()) {
                return Err(ConfigError::DuplicateSection(section.key.clone()));
            }

            let mut field_names = HashSet::new();
            for field in &section.fields {
                if !field_names.insert(field.name.as_str()) {
                    return Err(ConfigError::DuplicateField {
                        section: section.key.clone(),
                        field: field.name.clone(),
                    });
                }
                let has_labels = field.labels.iter().any(|l| !l.trim().is_empty());
                if !has_labels && field.pattern.is_none() {
                    return Err(ConfigError::UnmatchableField {
                        section: section.key.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Lowercase and collapse whitespace, for name comparisons.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`, the path passed via `--config`
/// 2. `./.transparency-checkr/config.toml`
/// 3. `~/.config/transparency-checkr/config.toml`
/// 4. Built-in [`Config::builtin`]
pub fn load_config(base_dir: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = base_dir.join(".transparency-checkr").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("transparency-checkr")
            .join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::builtin()?)
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .map_err(ConfigError::from)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    Ok(config)
}
