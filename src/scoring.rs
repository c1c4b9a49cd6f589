use std::collections::BTreeMap;

use crate::config::{ScoringConfig, SectionSchema};
use crate::models::{SectionRecord, Sections, TrafficLight, TransparencyScore};

/// Completeness of one section against its schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionScore {
    /// Present schema fields / schema fields, in `0..=1`.
    pub score: f64,
    pub filled: bool,
    pub bonus_star: bool,
}

/// Score a section. Fields outside the schema do not count.
pub fn score_section(record: &SectionRecord, schema: &SectionSchema) -> SectionScore {
    let total = schema.fields.len();
    if total == 0 {
        return SectionScore {
            score: 0.0,
            filled: false,
            bonus_star: false,
        };
    }

    let present = schema
        .fields
        .iter()
        .filter(|f| record.fields.get(&f.name).is_some_and(|r| r.is_present()))
        .count();

    SectionScore {
        score: present as f64 / total as f64,
        filled: present > 0,
        bonus_star: schema.bonus && present == total,
    }
}

/// Recompute `filled` and `bonus_star` on every schema section, adding
/// missing sections as empty records.
pub fn apply_flags(sections: &mut Sections, schemas: &[SectionSchema]) {
    for schema in schemas {
        let record = sections.entry(schema.key.clone()).or_default();
        let score = score_section(record, schema);
        record.filled = score.filled;
        record.bonus_star = score.bonus_star;
    }
}

/// Score all sections. Sections without schema fields are left out of the
/// mean and of the per-section map.
pub fn score_sections(
    sections: &Sections,
    schemas: &[SectionSchema],
    scoring: &ScoringConfig,
) -> TransparencyScore {
    let empty = SectionRecord::default();
    let mut per_section = BTreeMap::new();
    let mut bonus_stars = 0u8;
    let mut filled = 0usize;

    for schema in schemas.iter().filter(|s| !s.fields.is_empty()) {
        let record = sections.get(&schema.key).unwrap_or(&empty);
        let score = score_section(record, schema);
        if score.bonus_star {
            bonus_stars = bonus_stars.saturating_add(1);
        }
        if score.filled {
            filled += 1;
        }
        per_section.insert(schema.key.clone(), score.score);
    }

    let scores: Vec<f64> = per_section.values().copied().collect();
    let overall = overall_from(&scores);
    let completeness_percent = if scores.is_empty() {
        0
    } else {
        (filled * 100 / scores.len()) as u8
    };

    TransparencyScore {
        overall,
        sections: per_section,
        bonus_stars,
        completeness_percent,
        traffic_light: traffic_light(overall, scoring),
    }
}

/// `round(mean × 100)` with ties to even; no scores → 0.
pub fn overall_from(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    (mean * 100.0).round_ties_even()
}

pub fn traffic_light(overall: f64, scoring: &ScoringConfig) -> TrafficLight {
    let share = overall / 100.0;
    if share >= scoring.green {
        TrafficLight::Green
    } else if share >= scoring.orange {
        TrafficLight::Orange
    } else {
        TrafficLight::Red
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, FieldKind, FieldSchema};
    use crate::models::{FieldRecord, FieldValue};

    fn schema(key: &str, bonus: bool, fields: &[&str]) -> SectionSchema {
        SectionSchema {
            key: key.into(),
            bonus,
            fields: fields
                .iter()
                .map(|name| FieldSchema {
                    name: name.to_string(),
                    labels: vec![name.to_string()],
                    pattern: None,
                    min_length: 1,
                    kind: FieldKind::Text,
                })
                .collect(),
        }
    }

    fn record(fields: &[(&str, &str)]) -> SectionRecord {
        SectionRecord {
            fields: fields
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        FieldRecord {
                            value: FieldValue::Text(value.to_string()),
                            source: None,
                        },
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_three_of_four_fields() {
        let s = schema("training", true, &["a", "b", "c", "d"]);
        let r = record(&[("a", "x"), ("b", "y"), ("c", "z")]);
        let score = score_section(&r, &s);
        assert_eq!(score.score, 0.75);
        assert!(score.filled);
        assert!(!score.bonus_star);
    }

    #[test]
    fn test_bonus_star_needs_all_fields() {
        let s = schema("energy", true, &["a", "b"]);
        let r = record(&[("a", "x"), ("b", "y")]);
        assert!(score_section(&r, &s).bonus_star);

        let plain = schema("general", false, &["a", "b"]);
        assert!(!score_section(&r, &plain).bonus_star);
    }

    #[test]
    fn test_blank_and_extra_fields_ignored() {
        let s = schema("general", false, &["a", "b"]);
        let r = record(&[("a", "  "), ("zzz", "value")]);
        let score = score_section(&r, &s);
        assert_eq!(score.score, 0.0);
        assert!(!score.filled);
    }

    #[test]
    fn test_overall_rounding() {
        assert_eq!(overall_from(&[1.0, 0.5, 0.0, 0.75, 0.25, 0.0, 0.0, 0.0]), 31.0);
        assert_eq!(overall_from(&[]), 0.0);
        assert_eq!(overall_from(&[1.0, 1.0]), 100.0);
    }

    #[test]
    fn test_overall_half_rounds_to_even() {
        let mut scores = [0.0; 8];
        scores[0] = 1.0;
        assert_eq!(overall_from(&scores), 12.0);
        scores[1] = 1.0;
        scores[2] = 1.0;
        assert_eq!(overall_from(&scores), 38.0);
        scores[3] = 1.0;
        scores[4] = 1.0;
        assert_eq!(overall_from(&scores), 62.0);
    }

    #[test]
    fn test_score_sections_skips_empty_schemas() {
        let scoring = ScoringConfig::default();
        let schemas = vec![
            schema("general", false, &["a", "b"]),
            schema("empty", false, &[]),
            schema("training", true, &["c"]),
        ];
        let mut sections = Sections::new();
        sections.insert("general".into(), record(&[("a", "x")]));
        sections.insert("training".into(), record(&[("c", "y")]));

        let score = score_sections(&sections, &schemas, &scoring);
        assert_eq!(score.sections.len(), 2);
        assert!(!score.sections.contains_key("empty"));
        assert_eq!(score.overall, 75.0);
        assert_eq!(score.bonus_stars, 1);
        assert_eq!(score.completeness_percent, 100);
        assert_eq!(score.traffic_light, TrafficLight::Orange);
    }

    #[test]
    fn test_empty_record_scores_zero() {
        let cfg = Config::builtin().unwrap();
        let score = score_sections(&Sections::new(), &cfg.sections, &cfg.scoring);
        assert_eq!(score.overall, 0.0);
        assert_eq!(score.sections.len(), 8);
        assert!(score.sections.values().all(|s| *s == 0.0));
        assert_eq!(score.completeness_percent, 0);
        assert_eq!(score.traffic_light, TrafficLight::Red);
    }

    #[test]
    fn test_traffic_light_thresholds() {
        let scoring = ScoringConfig::default();
        assert_eq!(traffic_light(80.0, &scoring), TrafficLight::Green);
        assert_eq!(traffic_light(79.0, &scoring), TrafficLight::Orange);
        assert_eq!(traffic_light(40.0, &scoring), TrafficLight::Orange);
        assert_eq!(traffic_light(39.0, &scoring), TrafficLight::Red);
    }

    #[test]
    fn test_apply_flags_adds_missing_sections() {
        let schemas = vec![
            schema("general", false, &["a"]),
            schema("training", true, &["c"]),
        ];
        let mut sections = Sections::new();
        sections.insert("training".into(), record(&[("c", "y")]));
        apply_flags(&mut sections, &schemas);

        assert!(!sections["general"].filled);
        assert!(sections["training"].filled);
        assert!(sections["training"].bonus_star);
    }
}
