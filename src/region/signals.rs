use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;
use tracing::debug;

use crate::config::{normalize_name, ConfigError, RegionConfig, SignalWeights};
use crate::models::{RegionCode, Signal, SignalKind};
use crate::normalize::NormalizedContent;

/// Longest clause scanned after a headquarters/deployment phrase.
const MAX_CLAUSE_CHARS: usize = 80;

/// Compiled region keyword tables. Built once per run; extraction is a pure
/// function of `(page, tables)`.
#[derive(Debug)]
pub struct SignalMatcher {
    weights: SignalWeights,
    /// `(suffix, region)`, longest suffix first.
    domains: Vec<(String, RegionCode)>,
    regulations: TermTable,
    entity_suffixes: TermTable,
    places: TermTable,
    headquarters: PhraseTable,
    deployment: PhraseTable,
    jurisdiction: PhraseTable,
}

impl SignalMatcher {
    pub fn new(config: &RegionConfig) -> Result<Self, ConfigError> {
        let mut domains: Vec<(String, RegionCode)> = config
            .domains
            .iter()
            .map(|(suffix, region)| {
                let suffix = suffix.trim().to_lowercase();
                let suffix = if suffix.starts_with('.') {
                    suffix
                } else {
                    format!(".{}", suffix)
                };
                (suffix, *region)
            })
            .collect();
        domains.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Ok(SignalMatcher {
            weights: config.weights.clone(),
            domains,
            regulations: TermTable::compile("region.regulations", &config.regulations, false)?,
            entity_suffixes: TermTable::compile(
                "region.entity_suffixes",
                &config.entity_suffixes,
                true,
            )?,
            places: TermTable::compile("region.places", &config.places, false)?,
            headquarters: PhraseTable::compile(
                "region.headquarters_phrases",
                &config.headquarters_phrases,
            )?,
            deployment: PhraseTable::compile(
                "region.deployment_phrases",
                &config.deployment_phrases,
            )?,
            jurisdiction: PhraseTable::compile(
                "region.jurisdiction_phrases",
                &config.jurisdiction_phrases,
            )?,
        })
    }

    /// Extract every region signal from one page, in kind order
    /// (domain, headquarters, regulatory, entity suffix, deployment, other).
    ///
    /// Empty pages produce no signals, not even from their URL.
    pub fn extract(&self, content: &NormalizedContent) -> Vec<Signal> {
        if content.is_empty() {
            return Vec::new();
        }

        let text = content.search.as_str();
        let mut signals = Vec::new();

        if let Some(host) = content.host.as_deref() {
            signals.extend(self.domain_signal(host));
        }
        signals.extend(self.headquarters_signals(text));
        signals.extend(self.regulatory_signals(text));
        signals.extend(self.entity_signals(&content.text));
        signals.extend(self.deployment_signals(text));
        signals.extend(self.jurisdiction_signals(text));

        debug!(
            url = %content.source_url,
            count = signals.len(),
            "extracted region signals"
        );
        signals
    }

    fn signal(&self, kind: SignalKind, region: RegionCode, evidence: &str) -> Signal {
        Signal {
            kind,
            region,
            weight: self.weights.weight(kind),
            evidence: evidence.to_string(),
        }
    }

    /// At most one signal per URL: the longest matching host suffix.
    fn domain_signal(&self, host: &str) -> Option<Signal> {
        self.domains
            .iter()
            .find(|(suffix, _)| host.ends_with(suffix.as_str()))
            .map(|(suffix, region)| self.signal(SignalKind::Domain, *region, suffix))
    }

    fn headquarters_signals(&self, text: &str) -> Vec<Signal> {
        self.headquarters
            .clauses(text)
            .filter_map(|clause| self.places.find_all(clause).into_iter().next())
            .map(|m| self.signal(SignalKind::Headquarters, m.region, &m.term))
            .collect()
    }

    /// One signal per region per page, however many regulations it names.
    fn regulatory_signals(&self, text: &str) -> Vec<Signal> {
        let mut seen = HashSet::new();
        self.regulations
            .find_all(text)
            .into_iter()
            .filter(|m| seen.insert(m.region))
            .map(|m| self.signal(SignalKind::Regulatory, m.region, &m.term))
            .collect()
    }

    /// One signal per distinct suffix per page; the suffix must follow a
    /// capitalized name, so this runs on the original-case text.
    fn entity_signals(&self, text: &str) -> Vec<Signal> {
        let mut seen = HashSet::new();
        self.entity_suffixes
            .find_all(text)
            .into_iter()
            .filter(|m| follows_name(text, m.start))
            .filter(|m| seen.insert(m.term.clone()))
            .map(|m| self.signal(SignalKind::EntitySuffix, m.region, &m.term))
            .collect()
    }

    /// Every distinct place named in a deployment clause counts.
    fn deployment_signals(&self, text: &str) -> Vec<Signal> {
        let mut signals = Vec::new();
        for clause in self.deployment.clauses(text) {
            let mut seen = HashSet::new();
            for m in self.places.find_all(clause) {
                if seen.insert(m.term.clone()) {
                    signals.push(self.signal(SignalKind::Deployment, m.region, &m.term));
                }
            }
        }
        signals
    }

    fn jurisdiction_signals(&self, text: &str) -> Vec<Signal> {
        self.jurisdiction
            .clauses(text)
            .filter_map(|clause| self.places.find_all(clause).into_iter().next())
            .map(|m| self.signal(SignalKind::Other, m.region, &m.term))
            .collect()
    }
}

#[derive(Debug, Clone)]
struct TermMatch {
    start: usize,
    term: String,
    region: RegionCode,
}

/// A keyword table compiled into one longest-first alternation.
#[derive(Debug)]
struct TermTable {
    re: Option<Regex>,
    lookup: HashMap<String, RegionCode>,
}

impl TermTable {
    fn compile(
        table: &'static str,
        entries: &BTreeMap<String, RegionCode>,
        case_insensitive: bool,
    ) -> Result<Self, ConfigError> {
        let lookup: HashMap<String, RegionCode> = entries
            .iter()
            .map(|(term, region)| (normalize_name(term), *region))
            .filter(|(term, _)| !term.is_empty())
            .collect();
        let terms: Vec<&str> = lookup.keys().map(String::as_str).collect();
        let prefix = if case_insensitive { "(?i)" } else { "" };
        let re = compile_alternation(table, &terms, prefix, "")?;
        Ok(TermTable { re, lookup })
    }

    /// Word-bounded matches in text order.
    fn find_all(&self, text: &str) -> Vec<TermMatch> {
        let Some(re) = &self.re else {
            return Vec::new();
        };
        re.find_iter(text)
            .filter(|m| is_word_bounded(text, m.start(), m.end()))
            .filter_map(|m| {
                let term = normalize_name(m.as_str());
                self.lookup.get(&term).map(|region| TermMatch {
                    start: m.start(),
                    term,
                    region: *region,
                })
            })
            .collect()
    }
}

/// Phrases that introduce a place clause ("headquartered in …").
#[derive(Debug)]
struct PhraseTable {
    re: Option<Regex>,
}

impl PhraseTable {
    fn compile(table: &'static str, phrases: &[String]) -> Result<Self, ConfigError> {
        let phrases: Vec<String> = phrases
            .iter()
            .map(|p| normalize_name(p))
            .filter(|p| !p.is_empty())
            .collect();
        let refs: Vec<&str> = phrases.iter().map(String::as_str).collect();
        let suffix = format!(r"\s+(?P<clause>[^;!?\n()]{{1,{}}})", MAX_CLAUSE_CHARS);
        let re = compile_alternation(table, &refs, "", &suffix)?;
        Ok(PhraseTable { re })
    }

    /// Clauses following each phrase, cut at the end of the sentence.
    fn clauses<'t>(&'t self, text: &'t str) -> impl Iterator<Item = &'t str> + 't {
        self.re
            .iter()
            .flat_map(move |re| re.captures_iter(text))
            .filter(move |caps| {
                caps.get(0).is_some_and(|m| starts_word(text, m.start()))
            })
            .filter_map(|caps| caps.name("clause"))
            .map(|clause| {
                let clause = clause.as_str();
                clause.split(". ").next().unwrap_or(clause).trim()
            })
    }
}

/// `<prefix>(?:t1|t2|…)<suffix>` with terms sorted longest first; inner
/// spaces match any whitespace run. `None` for an empty table.
fn compile_alternation(
    table: &'static str,
    terms: &[&str],
    prefix: &str,
    suffix: &str,
) -> Result<Option<Regex>, ConfigError> {
    if terms.is_empty() {
        return Ok(None);
    }

    let mut sorted = terms.to_vec();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternatives: Vec<String> = sorted
        .iter()
        .map(|term| {
            term.split(' ')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    let pattern = format!("{}(?:{}){}", prefix, alternatives.join("|"), suffix);

    Regex::new(&pattern)
        .map(Some)
        .map_err(|source| ConfigError::InvalidPattern {
            context: table.to_string(),
            source,
        })
}

fn starts_word(text: &str, start: usize) -> bool {
    !text[..start]
        .chars()
        .next_back()
        .is_some_and(char::is_alphanumeric)
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    starts_word(text, start) && !text[end..].chars().next().is_some_and(char::is_alphanumeric)
}

/// A legal-form suffix only counts right after a capitalized name:
/// `Acme, Inc`, `Acme GmbH`.
fn follows_name(text: &str, start: usize) -> bool {
    let head = &text[..start];
    let trimmed = head.trim_end();
    if trimmed.len() == head.len() {
        return false;
    }
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed);
    let word = trimmed
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or(trimmed);
    word.chars()
        .next()
        .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
}
