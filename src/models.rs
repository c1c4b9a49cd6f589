use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Closed set of jurisdictions a provider can resolve to.
///
/// Variants are declared in code order, so the derived `Ord` matches the
/// lexicographic order of [`RegionCode::as_str`] for every real region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegionCode {
    Au,
    Ca,
    Cn,
    Eu,
    Il,
    In,
    Jp,
    Kr,
    Sg,
    Uk,
    Us,
    Unknown,
}

impl RegionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionCode::Au => "AU",
            RegionCode::Ca => "CA",
            RegionCode::Cn => "CN",
            RegionCode::Eu => "EU",
            RegionCode::Il => "IL",
            RegionCode::In => "IN",
            RegionCode::Jp => "JP",
            RegionCode::Kr => "KR",
            RegionCode::Sg => "SG",
            RegionCode::Uk => "UK",
            RegionCode::Us => "US",
            RegionCode::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for RegionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a page came from. Drives the confidence attached to extracted fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    OfficialApi,
    OfficialDocs,
    OfficialNewsroom,
    Huggingface,
    Arxiv,
    Github,
    TechNews,
    GeneralWeb,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::OfficialApi => write!(f, "official_api"),
            SourceType::OfficialDocs => write!(f, "official_docs"),
            SourceType::OfficialNewsroom => write!(f, "official_newsroom"),
            SourceType::Huggingface => write!(f, "huggingface"),
            SourceType::Arxiv => write!(f, "arxiv"),
            SourceType::Github => write!(f, "github"),
            SourceType::TechNews => write!(f, "tech_news"),
            SourceType::GeneralWeb => write!(f, "general_web"),
        }
    }
}

/// One fetched page, as handed over by the fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContent {
    pub source_url: String,
    /// Inferred from the URL when the fetcher leaves it out.
    #[serde(default)]
    pub source_type: Option<SourceType>,
    #[serde(default)]
    pub text: String,
}

/// All pages fetched for a single model during one crawl pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInput {
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub pages: Vec<RawContent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Domain,
    Headquarters,
    Regulatory,
    EntitySuffix,
    Deployment,
    Other,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Domain => write!(f, "domain"),
            SignalKind::Headquarters => write!(f, "headquarters"),
            SignalKind::Regulatory => write!(f, "regulatory"),
            SignalKind::EntitySuffix => write!(f, "entity_suffix"),
            SignalKind::Deployment => write!(f, "deployment"),
            SignalKind::Other => write!(f, "other"),
        }
    }
}

/// A single piece of evidence pointing at a jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub region: RegionCode,
    pub weight: u32,
    /// The term, suffix or place that produced the signal.
    pub evidence: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    SignalBased,
    KnownProvider,
    Fallback,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionMethod::SignalBased => write!(f, "signal_based"),
            DetectionMethod::KnownProvider => write!(f, "known_provider"),
            DetectionMethod::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRegion {
    pub region: RegionCode,
    pub method: DetectionMethod,
    pub multi_region: bool,
    pub candidate_scores: BTreeMap<RegionCode, u32>,
    /// Regions with a score above the presence threshold that were not chosen.
    #[serde(default)]
    pub secondary_regions: Vec<RegionCode>,
}

/// Value of a documentation field.
///
/// Rendering: `Text` as-is, `List` joined with `", "`, `KeyValue` as
/// `"k: v"` pairs joined with `"; "`, `Structured` by its display string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    KeyValue(BTreeMap<String, String>),
    Structured {
        display: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
    },
}

impl FieldValue {
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::List(items) => items.join(", "),
            FieldValue::KeyValue(pairs) => pairs
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
            FieldValue::Structured { display, .. } => display.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSource {
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub value: FieldValue,
    #[serde(default)]
    pub source: Option<FieldSource>,
}

impl FieldRecord {
    pub fn text(&self) -> String {
        self.value.render()
    }

    pub fn is_present(&self) -> bool {
        !self.text().trim().is_empty()
    }

    /// Confidence of the attributed source; unattributed fields count as 0.
    pub fn confidence(&self) -> f64 {
        self.source.as_ref().map(|s| s.confidence).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldRecord>,
    #[serde(default)]
    pub filled: bool,
    #[serde(default)]
    pub bonus_star: bool,
}

/// Section key → section record.
pub type Sections = BTreeMap<String, SectionRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLight {
    Green,
    Orange,
    Red,
}

impl std::fmt::Display for TrafficLight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrafficLight::Green => write!(f, "green"),
            TrafficLight::Orange => write!(f, "orange"),
            TrafficLight::Red => write!(f, "red"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransparencyScore {
    /// Rounded mean of the section scores, scaled to 0..=100.
    pub overall: f64,
    pub sections: BTreeMap<String, f64>,
    pub bonus_stars: u8,
    /// Share of scored sections with at least one field, floored.
    pub completeness_percent: u8,
    pub traffic_light: TrafficLight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeCategory {
    Big,
    Small,
    Unknown,
}

impl std::fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeCategory::Big => write!(f, "Big"),
            SizeCategory::Small => write!(f, "Small"),
            SizeCategory::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub region_detected: RegionCode,
    pub region_detection_method: DetectionMethod,
    #[serde(default)]
    pub source_urls: Vec<String>,
    #[serde(default)]
    pub code_of_practice_signatory: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub model_name: String,
    pub provider: String,
    pub resolved_region: ResolvedRegion,
    pub size: SizeCategory,
    /// `<region>-<size>`, used to group models in rankings.
    pub label: String,
    pub sections: Sections,
    pub transparency_score: TransparencyScore,
    pub provenance: Provenance,
}

impl ModelRecord {
    /// Identifier used by the record store.
    pub fn key(&self) -> String {
        record_key(&self.provider, &self.model_name)
    }
}

pub fn record_key(provider: &str, model_name: &str) -> String {
    format!(
        "{}/{}",
        provider.trim().to_lowercase(),
        model_name.trim().to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_order_is_lexicographic() {
        let mut regions = vec![
            RegionCode::Us,
            RegionCode::Eu,
            RegionCode::Uk,
            RegionCode::Au,
            RegionCode::Sg,
            RegionCode::In,
            RegionCode::Il,
        ];
        regions.sort();
        let codes: Vec<&str> = regions.iter().map(|r| r.as_str()).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn test_field_value_render() {
        assert_eq!(FieldValue::Text("MIT".into()).render(), "MIT");
        assert_eq!(
            FieldValue::List(vec!["text".into(), "image".into()]).render(),
            "text, image"
        );

        let mut pairs = BTreeMap::new();
        pairs.insert("gpu".to_string(), "H100".to_string());
        pairs.insert("memory".to_string(), "80GB".to_string());
        assert_eq!(FieldValue::KeyValue(pairs).render(), "gpu: H100; memory: 80GB");

        let structured = FieldValue::Structured {
            display: "70B parameters".into(),
            attributes: BTreeMap::new(),
        };
        assert_eq!(structured.render(), "70B parameters");
    }

    #[test]
    fn test_field_presence_and_confidence() {
        let empty = FieldRecord {
            value: FieldValue::List(Vec::new()),
            source: None,
        };
        assert!(!empty.is_present());
        assert_eq!(empty.confidence(), 0.0);

        let sourced = FieldRecord {
            value: FieldValue::Text("Apache-2.0".into()),
            source: Some(FieldSource {
                url: "https://example.com".into(),
                source_type: SourceType::OfficialDocs,
                confidence: 0.95,
            }),
        };
        assert!(sourced.is_present());
        assert_eq!(sourced.confidence(), 0.95);
    }

    #[test]
    fn test_region_serde_codes() {
        let json = serde_json::to_string(&RegionCode::Uk).unwrap();
        assert_eq!(json, "\"UK\"");
        let parsed: RegionCode = serde_json::from_str("\"UNKNOWN\"").unwrap();
        assert_eq!(parsed, RegionCode::Unknown);
    }

    #[test]
    fn test_record_key_normalizes_case() {
        assert_eq!(record_key(" Google ", "Gemini 2.5 Pro"), "google/gemini 2.5 pro");
    }
}
