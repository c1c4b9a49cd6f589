use crate::config::SourcesConfig;
use crate::models::{FieldSource, SourceType};
use crate::normalize::NormalizedContent;

/// Classifies pages by host and attaches source confidence.
#[derive(Debug, Clone)]
pub struct SourceClassifier {
    config: SourcesConfig,
}

impl SourceClassifier {
    pub fn new(config: &SourcesConfig) -> Self {
        let mut config = config.clone();
        for list in &mut config.trusted_domains {
            for domain in &mut list.domains {
                *domain = domain.trim().trim_start_matches('.').to_lowercase();
            }
        }
        SourceClassifier { config }
    }

    /// Source type for a host: the first trusted list containing the host or
    /// one of its parent domains, else `general_web`.
    pub fn classify_host(&self, host: Option<&str>) -> SourceType {
        let Some(host) = host else {
            return SourceType::GeneralWeb;
        };

        self.config
            .trusted_domains
            .iter()
            .find(|list| {
                list.domains
                    .iter()
                    .any(|d| host == d || host.ends_with(&format!(".{}", d)))
            })
            .map(|list| list.source_type)
            .unwrap_or(SourceType::GeneralWeb)
    }

    /// Declared source type, or the one inferred from the page host.
    pub fn source_type(&self, content: &NormalizedContent) -> SourceType {
        content
            .source_type
            .unwrap_or_else(|| self.classify_host(content.host.as_deref()))
    }

    pub fn confidence(&self, source_type: SourceType) -> f64 {
        self.config.confidence.get(source_type)
    }

    /// Attribution for every field extracted from `content`.
    pub fn attribute(&self, content: &NormalizedContent) -> FieldSource {
        let source_type = self.source_type(content);
        FieldSource {
            url: content.source_url.clone(),
            source_type,
            confidence: self.confidence(source_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::RawContent;
    use crate::normalize::normalize;

    fn classifier() -> SourceClassifier {
        SourceClassifier::new(&Config::builtin().unwrap().sources)
    }

    #[test]
    fn test_classify_trusted_hosts() {
        let c = classifier();
        assert_eq!(c.classify_host(Some("huggingface.co")), SourceType::Huggingface);
        assert_eq!(c.classify_host(Some("www.arxiv.org")), SourceType::Arxiv);
        assert_eq!(c.classify_host(Some("github.com")), SourceType::Github);
        assert_eq!(c.classify_host(Some("notgithub.com")), SourceType::GeneralWeb);
        assert_eq!(c.classify_host(None), SourceType::GeneralWeb);
    }

    #[test]
    fn test_declared_type_wins() {
        let c = classifier();
        let page = normalize(&RawContent {
            source_url: "https://github.com/acme/model".into(),
            source_type: Some(SourceType::OfficialApi),
            text: String::new(),
        });
        let source = c.attribute(&page);
        assert_eq!(source.source_type, SourceType::OfficialApi);
        assert_eq!(source.confidence, 1.0);
        assert_eq!(source.url, "https://github.com/acme/model");
    }

    #[test]
    fn test_inferred_type_confidence() {
        let c = classifier();
        let page = normalize(&RawContent {
            source_url: "https://huggingface.co/acme/model".into(),
            source_type: None,
            text: String::new(),
        });
        let source = c.attribute(&page);
        assert_eq!(source.source_type, SourceType::Huggingface);
        assert_eq!(source.confidence, 0.85);
    }
}
