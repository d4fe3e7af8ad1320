//! Fact extraction from natural language
//!
//! Regex-driven triple extraction: first-person patterns pin the
//! subject to `user`, "X is a Y" style patterns carry their own
//! subject. Extracted entities are normalized and stop-word filtered
//! before they reach the knowledge graph.

use regex::Regex;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFact {
    pub subject: String,
    pub relation: String,
    pub object: String,
    pub confidence: f32,
}

struct Pattern {
    regex: Regex,
    relation: &'static str,
    /// `Some("user")` pins the subject; `None` takes it from capture 1.
    fixed_subject: Option<&'static str>,
    confidence: f32,
}

pub struct FactExtractor {
    patterns: Vec<Pattern>,
    stopwords: HashSet<&'static str>,
}

impl FactExtractor {
    pub fn new() -> Self {
        let patterns = vec![
            Pattern {
                regex: Regex::new(r"(?i)\bi (?:love|like|enjoy|prefer) (\w+)").unwrap(),
                relation: "likes",
                fixed_subject: Some("user"),
                confidence: 0.9,
            },
            Pattern {
                regex: Regex::new(r"(?i)\bi (?:hate|dislike|can't stand) (\w+)").unwrap(),
                relation: "dislikes",
                fixed_subject: Some("user"),
                confidence: 0.9,
            },
            Pattern {
                regex: Regex::new(r"(?i)\bi (?:use|work with|utilize) (\w+)").unwrap(),
                relation: "uses",
                fixed_subject: Some("user"),
                confidence: 0.85,
            },
            Pattern {
                regex: Regex::new(r"(?i)\bi'?m? (?:learning|studying|practicing) (\w+)").unwrap(),
                relation: "is_learning",
                fixed_subject: Some("user"),
                confidence: 0.9,
            },
            Pattern {
                regex: Regex::new(
                    r"(?i)\bi'?m? (?:working on|building|creating|developing) (?:a |an )?(\w+)",
                )
                .unwrap(),
                relation: "is_building",
                fixed_subject: Some("user"),
                confidence: 0.85,
            },
            Pattern {
                regex: Regex::new(r"(?i)\bi (?:know|understand) (\w+)").unwrap(),
                relation: "knows",
                fixed_subject: Some("user"),
                confidence: 0.8,
            },
            Pattern {
                regex: Regex::new(
                    r"(?i)\bi (?:want to|need to|planning to) (?:learn|try|explore) (\w+)",
                )
                .unwrap(),
                relation: "wants_to_learn",
                fixed_subject: Some("user"),
                confidence: 0.75,
            },
            Pattern {
                regex: Regex::new(r"(?i)(\w+) is (?:a |an )?(\w+)").unwrap(),
                relation: "is_a",
                fixed_subject: None,
                confidence: 0.7,
            },
            Pattern {
                regex: Regex::new(r"(?i)(\w+) requires (\w+)").unwrap(),
                relation: "requires",
                fixed_subject: None,
                confidence: 0.75,
            },
            Pattern {
                regex: Regex::new(r"(?i)(\w+) is (?:for|used for) (\w+)").unwrap(),
                relation: "is_for",
                fixed_subject: None,
                confidence: 0.75,
            },
        ];

        let stopwords: HashSet<&'static str> = [
            "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with",
            "by", "from", "as", "is", "was", "are", "were", "be", "been", "being", "have", "has",
            "had", "do", "does", "did", "will", "would", "should", "could", "may", "might",
            "must", "can", "this", "that", "these", "those", "i", "you", "he", "she", "it", "we",
            "they", "not", "very", "really", "just",
        ]
        .into_iter()
        .collect();

        Self {
            patterns,
            stopwords,
        }
    }

    /// Extract all fact triples from the text, deduplicated.
    pub fn extract(&self, text: &str) -> Vec<ExtractedFact> {
        let mut facts = Vec::new();
        let mut seen: HashSet<(String, &'static str, String)> = HashSet::new();

        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                let (subject, object) = match pattern.fixed_subject {
                    Some(subject) => {
                        let Some(obj) = caps.get(1) else { continue };
                        (subject.to_string(), obj.as_str().to_string())
                    }
                    None => {
                        let (Some(subj), Some(obj)) = (caps.get(1), caps.get(2)) else {
                            continue;
                        };
                        (subj.as_str().to_string(), obj.as_str().to_string())
                    }
                };

                let subject = clean_entity(&subject);
                let object = clean_entity(&object);

                if object.len() < 3 || subject.len() < 2 {
                    continue;
                }
                if self.stopwords.contains(object.as_str())
                    || self.stopwords.contains(subject.as_str())
                {
                    continue;
                }

                if seen.insert((subject.clone(), pattern.relation, object.clone())) {
                    facts.push(ExtractedFact {
                        subject,
                        relation: pattern.relation.to_string(),
                        object,
                        confidence: pattern.confidence,
                    });
                }
            }
        }
        facts
    }
}

impl Default for FactExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn clean_entity(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    cleaned
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(
        facts: &'a [ExtractedFact],
        relation: &str,
        object: &str,
    ) -> Option<&'a ExtractedFact> {
        facts
            .iter()
            .find(|f| f.relation == relation && f.object == object)
    }

    #[test]
    fn test_likes_pattern() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("I love python programming");
        let fact = find(&facts, "likes", "python").unwrap();
        assert_eq!(fact.subject, "user");
        assert!((fact.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_uses_pattern() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("I use docker for my projects");
        assert!(find(&facts, "uses", "docker").is_some());
    }

    #[test]
    fn test_learning_pattern_with_contraction() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("I'm learning rust this month");
        let fact = find(&facts, "is_learning", "rust").unwrap();
        assert_eq!(fact.subject, "user");
    }

    #[test]
    fn test_free_subject_is_a() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("Python is a language");
        let fact = find(&facts, "is_a", "language").unwrap();
        assert_eq!(fact.subject, "python");
        assert!((fact.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_requires_pattern() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("Baking requires patience");
        let fact = find(&facts, "requires", "patience").unwrap();
        assert_eq!(fact.subject, "baking");
    }

    #[test]
    fn test_stopword_objects_rejected() {
        let extractor = FactExtractor::new();
        // "it" object would be a stopword; "is a that" nonsense filtered.
        let facts = extractor.extract("I love it");
        assert!(find(&facts, "likes", "it").is_none());
    }

    #[test]
    fn test_short_objects_rejected() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("I use go");
        assert!(facts.iter().all(|f| f.object.len() >= 3));
    }

    #[test]
    fn test_duplicates_removed() {
        let extractor = FactExtractor::new();
        let facts = extractor.extract("I love rust. I love rust.");
        assert_eq!(
            facts
                .iter()
                .filter(|f| f.relation == "likes" && f.object == "rust")
                .count(),
            1
        );
    }

    #[test]
    fn test_multiple_facts_one_sentence() {
        let extractor = FactExtractor::new();
        let facts =
            extractor.extract("I'm learning machine learning and I use tensorflow daily");
        assert!(find(&facts, "is_learning", "machine").is_some());
        assert!(find(&facts, "uses", "tensorflow").is_some());
    }

    #[test]
    fn test_entity_cleaning() {
        assert_eq!(clean_entity("Rust!"), "rust");
        assert_eq!(clean_entity("  Machine   Learning "), "machine_learning");
        assert_eq!(clean_entity("C-3PO"), "c-3po");
    }
}
