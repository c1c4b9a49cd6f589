use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use crate::config::{ConfigError, FieldKind, FieldSchema, SectionSchema};
use crate::models::{FieldRecord, FieldSource, FieldValue, SectionRecord, Sections};
use crate::normalize::{clean_value, is_noise, NormalizedContent};

/// Separators accepted between a label and its value.
const LABEL_SEPARATORS: &str = r"[:|=\u{2013}\u{2014}-]";

/// Compiled field schemas for every documentation section.
#[derive(Debug)]
pub struct FieldExtractor {
    sections: Vec<CompiledSection>,
}

#[derive(Debug)]
struct CompiledSection {
    key: String,
    fields: Vec<CompiledField>,
}

#[derive(Debug)]
struct CompiledField {
    name: String,
    kind: FieldKind,
    min_length: usize,
    /// `Label: value` on one line.
    labeled: Option<Regex>,
    /// A line holding only the label, value on the next non-empty line.
    heading: Option<Regex>,
    pattern: Option<Regex>,
}

/// A candidate value and the captures that came with it.
struct Candidate {
    value: String,
    attributes: BTreeMap<String, String>,
}

impl FieldExtractor {
    pub fn new(sections: &[SectionSchema]) -> Result<Self, ConfigError> {
        let sections = sections
            .iter()
            .map(|section| {
                let fields = section
                    .fields
                    .iter()
                    .map(|field| CompiledField::compile(&section.key, field))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledSection {
                    key: section.key.clone(),
                    fields,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(FieldExtractor { sections })
    }

    /// Extract every schema field found in `content`.
    ///
    /// All schema sections are present in the result; fields that were not
    /// found are absent. Section flags are left for the scorer.
    pub fn extract(&self, content: &NormalizedContent, source: &FieldSource) -> Sections {
        let mut sections = Sections::new();
        let mut found = 0usize;

        for section in &self.sections {
            let mut record = SectionRecord::default();
            if !content.is_empty() {
                for field in &section.fields {
                    if let Some(value) = field.find(&content.text) {
                        record.fields.insert(
                            field.name.clone(),
                            FieldRecord {
                                value,
                                source: Some(source.clone()),
                            },
                        );
                    }
                }
            }
            found += record.fields.len();
            sections.insert(section.key.clone(), record);
        }

        debug!(url = %content.source_url, fields = found, "extracted documentation fields");
        sections
    }
}

impl CompiledField {
    fn compile(section: &str, schema: &FieldSchema) -> Result<Self, ConfigError> {
        let context = format!("{}.{}", section, schema.name);

        let mut labels: Vec<String> = schema
            .labels
            .iter()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        labels.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        labels.dedup();

        let (labeled, heading) = if labels.is_empty() {
            (None, None)
        } else {
            let alternation = labels
                .iter()
                .map(|l| regex::escape(l).replace(' ', r"[ \t]+"))
                .collect::<Vec<_>>()
                .join("|");
            let labeled = format!(
                r"(?im)^[ \t]*(?:[-*#>]+[ \t]*)?(?:\*\*)?(?:{alternation})[ \t]*(?:\*\*)?[ \t]*{LABEL_SEPARATORS}(?:\*\*)?[ \t]*(?P<value>[^\n]+?)[ \t]*$"
            );
            let heading = format!(
                r"(?im)^[ \t]*(?:#+[ \t]*)?(?:\*\*)?(?:{alternation})(?:\*\*)?[ \t]*:?(?:\*\*)?[ \t]*\n(?:[ \t]*\n)*[ \t]*(?P<value>[^\n]+)"
            );
            (
                Some(compile(&context, &labeled)?),
                Some(compile(&context, &heading)?),
            )
        };

        let pattern = schema
            .pattern
            .as_deref()
            .map(|p| compile(&context, &format!("(?i){}", p)))
            .transpose()?;

        Ok(CompiledField {
            name: schema.name.clone(),
            kind: schema.kind,
            min_length: schema.min_length,
            labeled,
            heading,
            pattern,
        })
    }

    /// First acceptable value, trying labeled lines, then headings, then the
    /// pattern.
    fn find(&self, text: &str) -> Option<FieldValue> {
        self.candidates(text)
            .into_iter()
            .find_map(|candidate| self.accept(candidate))
    }

    fn candidates(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for re in [&self.labeled, &self.heading].into_iter().flatten() {
            for caps in re.captures_iter(text) {
                if let Some(value) = caps.name("value") {
                    candidates.push(Candidate {
                        value: value.as_str().to_string(),
                        attributes: self.attributes_of(value.as_str()),
                    });
                }
            }
        }

        if let Some(re) = &self.pattern {
            for caps in re.captures_iter(text) {
                let value = caps
                    .name("value")
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                candidates.push(Candidate {
                    value,
                    attributes: named_captures(re, &caps),
                });
            }
        }

        candidates
    }

    /// Attributes of a labeled value, read by running the pattern over it.
    fn attributes_of(&self, value: &str) -> BTreeMap<String, String> {
        match (&self.pattern, self.kind) {
            (Some(re), FieldKind::Structured) => re
                .captures(value)
                .map(|caps| named_captures(re, &caps))
                .unwrap_or_default(),
            _ => BTreeMap::new(),
        }
    }

    fn accept(&self, candidate: Candidate) -> Option<FieldValue> {
        let value = clean_value(&candidate.value);
        if is_noise(&value) || value.chars().count() < self.min_length {
            return None;
        }
        convert(self.kind, value, candidate.attributes)
    }
}

fn compile(context: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        context: context.to_string(),
        source,
    })
}

fn named_captures(re: &Regex, caps: &regex::Captures<'_>) -> BTreeMap<String, String> {
    re.capture_names()
        .flatten()
        .filter(|name| *name != "value")
        .filter_map(|name| {
            caps.name(name)
                .map(|m| (name.to_string(), m.as_str().trim().to_lowercase()))
        })
        .collect()
}

/// Shape a cleaned value according to the field kind.
fn convert(kind: FieldKind, value: String, attributes: BTreeMap<String, String>) -> Option<FieldValue> {
    match kind {
        FieldKind::Text => Some(FieldValue::Text(value)),
        FieldKind::List => {
            let items = split_list(&value);
            if items.is_empty() {
                None
            } else {
                Some(FieldValue::List(items))
            }
        }
        FieldKind::KeyValue => Some(
            split_pairs(&value)
                .map(FieldValue::KeyValue)
                .unwrap_or(FieldValue::Text(value)),
        ),
        FieldKind::Structured => Some(FieldValue::Structured {
            display: value,
            attributes,
        }),
    }
}

/// Split `"text, images and audio"` into items.
fn split_list(value: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for part in value.split([',', ';']) {
        for item in part.split(" and ") {
            let item = item
                .trim()
                .trim_end_matches('.')
                .trim_start_matches("and ")
                .trim();
            if !item.is_empty() && !items.iter().any(|i| i.eq_ignore_ascii_case(item)) {
                items.push(item.to_string());
            }
        }
    }
    items
}

/// Parse `"gpu: H100; memory = 80GB"`. Every part must carry a key.
fn split_pairs(value: &str) -> Option<BTreeMap<String, String>> {
    let mut pairs = BTreeMap::new();
    for part in value.split([';', ',']).map(str::trim).filter(|p| !p.is_empty()) {
        let (key, val) = part.split_once([':', '='])?;
        let (key, val) = (key.trim().to_lowercase(), val.trim().trim_end_matches('.'));
        if key.is_empty() || val.is_empty() {
            return None;
        }
        pairs.insert(key, val.to_string());
    }
    if pairs.is_empty() {
        None
    } else {
        Some(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{RawContent, SourceType};
    use crate::normalize::normalize;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(&Config::builtin().unwrap().sections).unwrap()
    }

    fn source() -> FieldSource {
        FieldSource {
            url: "https://docs.example.com/model".into(),
            source_type: SourceType::OfficialDocs,
            confidence: 0.95,
        }
    }

    fn extract(text: &str) -> Sections {
        let page = normalize(&RawContent {
            source_url: "https://docs.example.com/model".into(),
            source_type: Some(SourceType::OfficialDocs),
            text: text.into(),
        });
        extractor().extract(&page, &source())
    }

    fn field<'a>(sections: &'a Sections, section: &str, name: &str) -> Option<&'a FieldValue> {
        sections.get(section)?.fields.get(name).map(|f| &f.value)
    }

    #[test]
    fn test_labeled_lines() {
        let sections = extract(
            "# Model card\n\
             **License:** Apache-2.0\n\
             - Input modalities: text, images and audio\n\
             Output: text\n",
        );
        assert_eq!(
            field(&sections, "distribution", "license_type"),
            Some(&FieldValue::Text("Apache-2.0".into()))
        );
        assert_eq!(
            field(&sections, "properties", "input_modalities"),
            Some(&FieldValue::List(vec!["text".into(), "images".into(), "audio".into()]))
        );
        assert_eq!(
            field(&sections, "properties", "output_modalities"),
            Some(&FieldValue::List(vec!["text".into()]))
        );
    }

    #[test]
    fn test_heading_then_paragraph() {
        let sections = extract(
            "## Intended use\n\n\
             Research on large language models and assistant-style chat applications.\n",
        );
        let value = field(&sections, "use", "intended_use").unwrap();
        assert!(value.render().starts_with("Research on large language models"));
    }

    #[test]
    fn test_pattern_with_value_group() {
        let sections = extract("The model was released on 2024-07-23 alongside new tooling.");
        assert_eq!(
            field(&sections, "general", "release_date"),
            Some(&FieldValue::Text("2024-07-23".into()))
        );
    }

    #[test]
    fn test_structured_attributes() {
        let sections = extract("It has 405B parameters and a 128k context window.");
        match field(&sections, "properties", "parameters") {
            Some(FieldValue::Structured { display, attributes }) => {
                assert_eq!(display, "405B parameters");
                assert_eq!(attributes.get("count").map(String::as_str), Some("405"));
                assert_eq!(attributes.get("unit").map(String::as_str), Some("b"));
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_key_value_and_fallback() {
        let sections = extract("Inference hardware: gpu: 8x H100; memory: 640GB");
        let mut expected = BTreeMap::new();
        expected.insert("gpu".to_string(), "8x H100".to_string());
        expected.insert("memory".to_string(), "640GB".to_string());
        assert_eq!(
            field(&sections, "compute", "hardware_specs"),
            Some(&FieldValue::KeyValue(expected))
        );

        let sections = extract("Hardware requirements: a single consumer GPU");
        assert_eq!(
            field(&sections, "compute", "hardware_specs"),
            Some(&FieldValue::Text("a single consumer GPU".into()))
        );
    }

    #[test]
    fn test_min_length_and_noise_rejected() {
        let sections = extract("Description: short\nLicense: N/A\nIntended use: click here");
        assert!(field(&sections, "general", "description").is_none());
        assert!(field(&sections, "distribution", "license_type").is_none());
        assert!(field(&sections, "use", "intended_use").is_none());
    }

    #[test]
    fn test_later_candidate_used_when_first_rejected() {
        let sections = extract("License: N/A\nLicense: MIT");
        assert_eq!(
            field(&sections, "distribution", "license_type"),
            Some(&FieldValue::Text("MIT".into()))
        );
    }

    #[test]
    fn test_source_attached() {
        let sections = extract("License: MIT");
        let record = &sections["distribution"].fields["license_type"];
        assert_eq!(record.source, Some(source()));
    }

    #[test]
    fn test_empty_content_keeps_all_sections() {
        let sections = extract("");
        assert_eq!(sections.len(), 8);
        assert!(sections.values().all(|s| s.fields.is_empty()));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let schema = SectionSchema {
            key: "general".into(),
            bonus: false,
            fields: vec![FieldSchema {
                name: "broken".into(),
                labels: Vec::new(),
                pattern: Some("(unclosed".into()),
                min_length: 1,
                kind: FieldKind::Text,
            }],
        };
        match FieldExtractor::new(&[schema]) {
            Err(ConfigError::InvalidPattern { context, .. }) => assert_eq!(context, "general.broken"),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("text; code, and images."),
            vec!["text".to_string(), "code".to_string(), "images".to_string()]
        );
        assert!(split_list(" , ; ").is_empty());
    }
}
