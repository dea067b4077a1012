//! Relevance ranking of raw search results through the decision service

use std::sync::Arc;

use autoops_provider::{DecisionService, StructuredRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::search::SearchHit;

/// Search result with an optional 1-10 relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(rename = "relevanceScore", default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl ScoredResult {
    pub fn unscored(
        title: impl Into<String>,
        link: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
            relevance_score: None,
        }
    }
}

impl From<&SearchHit> for ScoredResult {
    fn from(hit: &SearchHit) -> Self {
        ScoredResult::unscored(hit.title.clone(), hit.link.clone(), hit.snippet.clone())
    }
}

pub fn relevant_results_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "results": {
                "type": "array",
                "description": "Array of the most relevant search results",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "Title of the result" },
                        "link": { "type": "string", "description": "URL of the result" },
                        "snippet": { "type": "string", "description": "Snippet of the result" },
                        "relevanceScore": {
                            "type": "number",
                            "description": "How relevant this result is (1-10)"
                        }
                    },
                    "required": ["title", "link", "snippet", "relevanceScore"]
                }
            }
        },
        "required": ["results"]
    })
}

#[derive(Deserialize)]
struct RankedResults {
    results: Vec<ScoredResult>,
}

/// Scores candidates against a topic
#[derive(Clone)]
pub struct RelevanceFilter {
    decision: Arc<dyn DecisionService>,
}

impl RelevanceFilter {
    pub fn new(decision: Arc<dyn DecisionService>) -> Self {
        Self { decision }
    }

    /// At most `max_results` candidates, best first.
    ///
    /// Empty input returns empty without calling the decision service. If
    /// scoring fails, the first `max_results` candidates come back unscored
    /// in their original order.
    pub async fn filter_by_relevance(
        &self,
        topic: &str,
        sub_topic: &str,
        candidates: &[SearchHit],
        max_results: usize,
    ) -> Vec<ScoredResult> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let simplified: Vec<ScoredResult> = candidates.iter().map(ScoredResult::from).collect();

        let request = StructuredRequest::new(
            format!(
                "Analyze these search results for relevance to the topic \"{}\" with focus on \"{}\". \
                 Score each result on a scale of 1-10 and return only the most relevant ones (max {}).",
                topic, sub_topic, max_results
            ),
            rubric(topic, sub_topic, max_results, &simplified),
            relevant_results_schema(),
        );

        let ranked = self
            .decision
            .generate(request)
            .await
            .map_err(|e| e.to_string())
            .and_then(|value| {
                serde_json::from_value::<RankedResults>(value).map_err(|e| e.to_string())
            });

        match ranked {
            Ok(RankedResults { mut results }) => {
                results.sort_by(|a, b| {
                    let a = a.relevance_score.unwrap_or(f64::MIN);
                    let b = b.relevance_score.unwrap_or(f64::MIN);
                    b.total_cmp(&a)
                });
                results.truncate(max_results);
                debug!("◆ relevance filter kept {} of {}", results.len(), candidates.len());
                results
            }
            Err(e) => {
                warn!("◆ relevance filtering failed, using raw order: {}", e);
                simplified.into_iter().take(max_results).collect()
            }
        }
    }
}

fn rubric(topic: &str, sub_topic: &str, max_results: usize, candidates: &[ScoredResult]) -> String {
    let listing = serde_json::to_string(candidates).unwrap_or_else(|_| "[]".to_string());
    format!(
        "We need highly relevant information about \"{topic}\" specifically focusing on \"{sub_topic}\".\n\
         The information should be credible and informative.\n\
         Prefer sources that provide factual information, detailed explanations, or expert opinions.\n\
         Avoid social media discussions, advertisements, and overly simplistic content.\n\n\
         Score and return only the most relevant results (maximum {max_results}) from the following list:\n\n\
         {listing}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rubric_lists_candidates() {
        let candidates = vec![ScoredResult::unscored("t", "https://l", "s")];
        let text = rubric("ssh", "hardening", 3, &candidates);
        assert!(text.contains("\"ssh\""));
        assert!(text.contains("maximum 3"));
        assert!(text.contains("social media"));
        assert!(text.contains(r#"[{"title":"t","link":"https://l","snippet":"s"}]"#));
    }

    #[test]
    fn test_scored_result_wire_name() {
        let parsed: ScoredResult = serde_json::from_value(json!({
            "title": "a", "link": "b", "snippet": "c", "relevanceScore": 7
        }))
        .unwrap();
        assert_eq!(parsed.relevance_score, Some(7.0));
    }
}
