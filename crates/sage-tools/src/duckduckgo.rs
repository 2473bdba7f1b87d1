//! DuckDuckGo Instant Answer client
//!
//! Keyless search backend. The Instant Answer API returns an abstract,
//! a direct answer or definition, and a list of related topics rather
//! than a full page of web results.

use serde::Deserialize;
use std::time::Duration;

const DUCKDUCKGO_API: &str = "https://api.duckduckgo.com/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum DuckDuckGoError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(u16),
    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct DuckDuckGoClient {
    client: reqwest::Client,
}

impl DuckDuckGoClient {
    pub fn new() -> Result<Self, DuckDuckGoError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("Sage/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub async fn search(&self, query: &str) -> Result<InstantAnswer, DuckDuckGoError> {
        let response = self
            .client
            .get(DUCKDUCKGO_API)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DuckDuckGoError::Api(status.as_u16()));
        }

        // The API answers with `application/x-javascript`, so decode by hand
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstantAnswer {
    pub heading: String,
    pub abstract_text: String,
    #[serde(rename = "AbstractURL")]
    pub abstract_url: String,
    pub abstract_source: String,
    pub answer: String,
    pub definition: String,
    #[serde(rename = "DefinitionURL")]
    pub definition_url: String,
    pub results: Vec<RelatedTopic>,
    pub related_topics: Vec<RelatedTopic>,
}

/// Either a single topic or a named group of topics
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

impl RelatedTopic {
    fn flatten<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        match self {
            RelatedTopic::Topic { text, first_url } => {
                out.push((text.as_str(), first_url.as_str()))
            }
            RelatedTopic::Group { topics, .. } => {
                for topic in topics {
                    topic.flatten(out);
                }
            }
        }
    }
}

impl InstantAnswer {
    pub fn format_results(&self, limit: usize) -> String {
        let mut output = String::new();

        if !self.answer.is_empty() {
            output.push_str(&format!("**Answer:** {}\n\n", self.answer));
        }

        if !self.abstract_text.is_empty() {
            if !self.heading.is_empty() {
                output.push_str(&format!("**{}**\n", self.heading));
            }
            output.push_str(&self.abstract_text);
            if !self.abstract_url.is_empty() {
                output.push_str(&format!(
                    "\nSource: {} ({})",
                    self.abstract_source, self.abstract_url
                ));
            }
            output.push_str("\n\n");
        }

        if !self.definition.is_empty() {
            output.push_str(&format!("**Definition:** {}\n", self.definition));
            if !self.definition_url.is_empty() {
                output.push_str(&format!("Source: {}\n", self.definition_url));
            }
            output.push('\n');
        }

        let mut topics = Vec::new();
        for topic in self.results.iter().chain(&self.related_topics) {
            topic.flatten(&mut topics);
        }
        if !topics.is_empty() {
            output.push_str("**Related:**\n\n");
            for (i, (text, url)) in topics.iter().take(limit).enumerate() {
                output.push_str(&format!("{}. {}\n   URL: {}\n", i + 1, text, url));
            }
        }

        if output.is_empty() {
            "No results found.".to_string()
        } else {
            output
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_abstract_and_grouped_topics() {
        let answer: InstantAnswer = serde_json::from_value(serde_json::json!({
            "Heading": "France",
            "AbstractText": "France is a country in Western Europe.",
            "AbstractURL": "https://en.wikipedia.org/wiki/France",
            "AbstractSource": "Wikipedia",
            "RelatedTopics": [
                { "Text": "Paris - capital of France", "FirstURL": "https://duckduckgo.com/Paris" },
                { "Name": "Regions", "Topics": [
                    { "Text": "Brittany", "FirstURL": "https://duckduckgo.com/Brittany" },
                    { "Text": "Normandy", "FirstURL": "https://duckduckgo.com/Normandy" }
                ]}
            ]
        }))
        .unwrap();

        let formatted = answer.format_results(2);
        assert!(formatted.starts_with("**France**\nFrance is a country in Western Europe."));
        assert!(formatted.contains("Source: Wikipedia (https://en.wikipedia.org/wiki/France)"));
        assert!(formatted.contains("2. Brittany\n   URL: https://duckduckgo.com/Brittany"));
        assert!(!formatted.contains("Normandy"));
    }

    #[test]
    fn test_format_empty_answer() {
        assert_eq!(InstantAnswer::default().format_results(5), "No results found.");
    }
}
