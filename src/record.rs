use std::sync::LazyLock;

use regex::Regex;

use crate::config::{Config, SizeConfig};
use crate::models::{
    DetectionMethod, FieldRecord, FieldValue, ModelInput, ModelRecord, Provenance, ResolvedRegion,
    Sections, SizeCategory,
};
use crate::scoring::{apply_flags, score_sections};

static PARAM_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?P<count>\d+(?:\.\d+)?)\s*(?P<unit>trillion|billion|million|[tbm])\b").unwrap()
});

/// Build a record from one pass over a model's pages.
pub fn assemble(
    input: &ModelInput,
    resolved: ResolvedRegion,
    sections: Sections,
    config: &Config,
) -> ModelRecord {
    let mut source_urls = Vec::new();
    for page in &input.pages {
        push_unique(&mut source_urls, page.source_url.trim());
    }

    let mut record = ModelRecord {
        model_name: input.model_name.trim().to_string(),
        provider: input.provider.trim().to_string(),
        provenance: Provenance {
            region_detected: resolved.region,
            region_detection_method: resolved.method,
            source_urls,
            code_of_practice_signatory: config.scoring.is_signatory(&input.provider),
        },
        resolved_region: resolved,
        size: SizeCategory::Unknown,
        label: String::new(),
        sections,
        transparency_score: score_sections(&Sections::new(), &[], &config.scoring),
    };
    refresh(&mut record, config);
    record
}

/// Keep `existing` unless `incoming` carries a value with strictly higher
/// confidence. Values are never combined.
pub fn merge_field(existing: Option<&FieldRecord>, incoming: &FieldRecord) -> bool {
    if !incoming.is_present() {
        return false;
    }
    match existing {
        Some(current) if current.is_present() => incoming.confidence() > current.confidence(),
        _ => true,
    }
}

/// Fold `incoming` into `base` field by field.
pub fn merge_sections(base: &mut Sections, incoming: &Sections) {
    for (key, section) in incoming {
        let target = base.entry(key.clone()).or_default();
        for (name, field) in &section.fields {
            if merge_field(target.fields.get(name), field) {
                target.fields.insert(name.clone(), field.clone());
            }
        }
    }
}

/// Merge a newer record for the same model into a stored one.
///
/// Fields follow [`merge_field`]. The newer resolution replaces the stored
/// one unless it is a fallback and the stored one is not. Flags, scores and
/// size are recomputed; merging a record into itself is a no-op.
pub fn merge_records(existing: &ModelRecord, incoming: &ModelRecord, config: &Config) -> ModelRecord {
    let mut merged = existing.clone();
    merge_sections(&mut merged.sections, &incoming.sections);

    let keep_existing_region = incoming.resolved_region.method == DetectionMethod::Fallback
        && existing.resolved_region.method != DetectionMethod::Fallback;
    if !keep_existing_region {
        merged.resolved_region = incoming.resolved_region.clone();
    }
    merged.provenance.region_detected = merged.resolved_region.region;
    merged.provenance.region_detection_method = merged.resolved_region.method;
    for url in &incoming.provenance.source_urls {
        push_unique(&mut merged.provenance.source_urls, url);
    }
    merged.provenance.code_of_practice_signatory =
        config.scoring.is_signatory(&merged.provider);

    refresh(&mut merged, config);
    merged
}

/// Recompute everything derived from sections and region.
fn refresh(record: &mut ModelRecord, config: &Config) {
    apply_flags(&mut record.sections, &config.sections);
    record.transparency_score = score_sections(&record.sections, &config.sections, &config.scoring);
    record.size = classify_size(&record.model_name, &record.sections, &config.size);
    record.label = format!("{}-{}", record.resolved_region.region, record.size);
}

/// Size from the documented parameter count, else from name markers.
pub fn classify_size(model_name: &str, sections: &Sections, config: &SizeConfig) -> SizeCategory {
    let parameters = sections
        .get("properties")
        .and_then(|s| s.fields.get("parameters"))
        .and_then(parameter_billions);

    if let Some(billions) = parameters {
        return if billions >= config.big_threshold_billions {
            SizeCategory::Big
        } else {
            SizeCategory::Small
        };
    }

    let name = model_name.to_lowercase();
    if config.small_name_markers.iter().any(|m| has_marker(&name, m)) {
        SizeCategory::Small
    } else if config.big_name_markers.iter().any(|m| has_marker(&name, m)) {
        SizeCategory::Big
    } else {
        SizeCategory::Unknown
    }
}

/// Parameter count in billions, from structured attributes or the text.
pub fn parameter_billions(field: &FieldRecord) -> Option<f64> {
    if let FieldValue::Structured { attributes, .. } = &field.value {
        if let (Some(count), Some(unit)) = (attributes.get("count"), attributes.get("unit")) {
            if let Some(b) = to_billions(count, unit) {
                return Some(b);
            }
        }
    }

    let text = field.text();
    let caps = PARAM_COUNT_RE.captures(&text)?;
    to_billions(&caps["count"], &caps["unit"])
}

fn to_billions(count: &str, unit: &str) -> Option<f64> {
    let count: f64 = count.trim().parse().ok()?;
    match unit.trim().to_lowercase().as_str() {
        "t" | "trillion" => Some(count * 1000.0),
        "b" | "billion" => Some(count),
        "m" | "million" => Some(count / 1000.0),
        _ => None,
    }
}

/// Marker occurring at the start of a name token (`gpt-4o-mini` has `mini`,
/// `gemini` does not).
fn has_marker(name: &str, marker: &str) -> bool {
    let marker = marker.trim().to_lowercase();
    if marker.is_empty() {
        return false;
    }
    name.match_indices(&marker).any(|(start, _)| {
        name[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

fn push_unique(urls: &mut Vec<String>, url: &str) {
    if !url.is_empty() && !urls.iter().any(|u| u == url) {
        urls.push(url.to_string());
    }
}
