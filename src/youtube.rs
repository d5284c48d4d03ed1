//! YouTube search, the external media resolver.
//!
//! One narrow, fallible call: free-text query in, first matching video (or nothing) out.
//! Playback of the resolved URL is songbird's job, not ours.

use anyhow::{anyhow, Context as _, Result};

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

pub struct MediaResolver {
    http: reqwest::Client,
    api_key: Option<String>,
}

pub struct ResolvedTrack {
    pub title: String,
    pub url: String,
}

#[derive(serde::Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(serde::Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(serde::Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(serde::Deserialize)]
struct SearchSnippet {
    title: String,
}

impl MediaResolver {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }

    /// Resolve a query to the best-matching video, or `None` if nothing matched.
    pub async fn search(&self, query: &str) -> Result<Option<ResolvedTrack>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("save your API key in the YT_API_KEY env variable!"))?;

        let response: SearchResponse = self
            .http
            .get(SEARCH_URL)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", "1"),
                ("q", query),
                ("key", api_key),
            ])
            .send()
            .await
            .context("video search request failed")?
            .error_for_status()
            .context("video search request rejected")?
            .json()
            .await
            .context("could not parse video search response")?;

        Ok(response.items.into_iter().next().map(|item| ResolvedTrack {
            url: format!("{}{}", WATCH_URL, item.id.video_id),
            title: item.snippet.title,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_response() {
        let body = r#"{
            "kind": "youtube#searchListResponse",
            "items": [
                {
                    "kind": "youtube#searchResult",
                    "id": { "kind": "youtube#video", "videoId": "dQw4w9WgXcQ" },
                    "snippet": { "title": "Never Gonna Give You Up" }
                }
            ]
        }"#;

        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let item = response.items.into_iter().next().unwrap();
        assert_eq!(item.id.video_id, "dQw4w9WgXcQ");
        assert_eq!(item.snippet.title, "Never Gonna Give You Up");
    }

    #[test]
    fn empty_response_has_no_items() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(response.items.is_empty());
    }
}
