//! Web page fetching and search result formatting

use std::sync::OnceLock;
use std::time::Duration;

use autoops_history::ResultEnvelope;
use regex::Regex;
use tracing::debug;

use crate::relevance::ScoredResult;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) autoops";

/// Bounded page fetch with markup stripped
#[derive(Debug, Clone)]
pub struct WebFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_chars: usize,
}

impl WebFetcher {
    pub fn new(timeout: Duration, max_chars: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            max_chars,
        }
    }

    pub async fn browse(&self, url: &str) -> ResultEnvelope {
        debug!("◆ fetching {}", url);
        let response = match self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return ResultEnvelope::error(format!(
                    "Fetching {} timed out after {} seconds",
                    url,
                    self.timeout.as_secs()
                ))
            }
            Err(e) => return ResultEnvelope::error(format!("Failed to fetch {}: {}", url, e)),
        };

        let status = response.status();
        if !status.is_success() {
            return ResultEnvelope::error(format!("Fetching {} returned HTTP {}", url, status.as_u16()));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return ResultEnvelope::error(format!("Failed to read {}: {}", url, e)),
        };

        let text = extract_text(&body);
        let (content, truncated) = truncate_chars(&text, self.max_chars);
        ResultEnvelope::success()
            .with("url", url)
            .with("content", content)
            .with("truncated", truncated)
    }
}

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>|<!--.*?-->")
            .expect("static pattern")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("static pattern"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

/// Drop scripts, styles and tags; decode common entities; collapse whitespace
pub fn extract_text(html: &str) -> String {
    let text = block_re().replace_all(html, " ");
    let text = tag_re().replace_all(&text, " ");
    let text = decode_html_entities(&text);
    whitespace_re().replace_all(&text, " ").trim().to_string()
}

/// Cut at a char boundary; returns whether anything was dropped
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text.to_string(), false),
    }
}

fn decode_html_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Title/Link/Snippet/Relevance blocks separated by blank lines
pub fn format_results(results: &[ScoredResult]) -> String {
    results
        .iter()
        .map(|r| {
            let relevance = match r.relevance_score {
                Some(score) => format!("{}/10", score),
                None => "n/a".to_string(),
            };
            format!(
                "Title: {}\nLink: {}\nSnippet: {}\nRelevance: {}",
                r.title, r.link, r.snippet, relevance
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
