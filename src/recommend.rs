//! Video recommendations for the quiz topics.
//!
//! A thin lookup against the YouTube Data API v3: `search` finds videos for a
//! topic, then `videos` fills in duration and view count. The lookup is
//! strictly best-effort. Any transport or decoding failure is logged and
//! yields an empty list; it never fails the quiz.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default YouTube Data API endpoint.
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Topics looked up per request.
pub const MAX_RECOMMENDATION_TOPICS: usize = 3;

/// One recommended video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecommendation {
    pub title: String,
    pub link: String,
    /// `H:MM:SS` or `M:SS`; empty when unknown.
    pub duration: String,
    pub channel: String,
    pub view_count: u64,
    pub thumbnail: String,
}

/// Map a search phrase onto related videos. Failures yield an empty list.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Vec<VideoRecommendation>;
}

/// Look up the first [`MAX_RECOMMENDATION_TOPICS`] topics, de-duplicating
/// videos by link.
pub async fn recommend_for_topics(
    search: &dyn VideoSearch,
    topics: &[String],
    per_topic: usize,
) -> Vec<VideoRecommendation> {
    if per_topic == 0 {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for topic in topics.iter().take(MAX_RECOMMENDATION_TOPICS) {
        for video in search.search(topic, per_topic).await {
            if seen.insert(video.link.clone()) {
                out.push(video);
            }
        }
    }
    info!("Found {} video recommendations", out.len());
    out
}

/// [`VideoSearch`] backed by the YouTube Data API v3.
#[derive(Clone)]
pub struct YouTubeSearch {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for YouTubeSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeSearch")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl YouTubeSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            base_url: YOUTUBE_API_BASE.to_string(),
        }
    }

    /// Read the key from `YOUTUBE_API_KEY`.
    pub fn from_env() -> Option<Self> {
        std::env::var("YOUTUBE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(Self::new)
    }

    /// Point at a different API root (a proxy, or a mock server in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn try_search(&self, query: &str, max_results: usize) -> Result<Vec<VideoRecommendation>, reqwest::Error> {
        let max = max_results.to_string();
        let found: SearchResponse = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", max.as_str()),
                ("q", query),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let hits: Vec<SearchItem> = found
            .items
            .into_iter()
            .filter(|i| i.id.video_id.is_some())
            .collect();
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = hits.iter().filter_map(|i| i.id.video_id.as_deref()).collect();
        let details = match self.video_details(&ids.join(",")).await {
            Ok(d) => d,
            Err(e) => {
                warn!("YouTube video details lookup failed: {}", e);
                HashMap::new()
            }
        };

        Ok(hits
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                let detail = details.get(&id);
                Some(VideoRecommendation {
                    title: item.snippet.title,
                    link: format!("https://www.youtube.com/watch?v={id}"),
                    duration: detail
                        .and_then(|d| format_iso_duration(&d.content_details.duration))
                        .unwrap_or_default(),
                    channel: item.snippet.channel_title,
                    view_count: detail
                        .and_then(|d| d.statistics.view_count.parse().ok())
                        .unwrap_or(0),
                    thumbnail: item
                        .snippet
                        .thumbnails
                        .medium
                        .or(item.snippet.thumbnails.default)
                        .map(|t| t.url)
                        .unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn video_details(&self, ids: &str) -> Result<HashMap<String, VideoItem>, reqwest::Error> {
        let videos: VideosResponse = self
            .client
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("part", "contentDetails,statistics"),
                ("id", ids),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(videos.items.into_iter().map(|v| (v.id.clone(), v)).collect())
    }
}

#[async_trait]
impl VideoSearch for YouTubeSearch {
    async fn search(&self, query: &str, max_results: usize) -> Vec<VideoRecommendation> {
        if query.trim().is_empty() || max_results == 0 {
            return Vec::new();
        }
        match self.try_search(query, max_results).await {
            Ok(videos) => {
                debug!("YouTube search '{}': {} videos", query, videos.len());
                videos
            }
            Err(e) => {
                warn!("YouTube search for '{}' failed: {}", query, e);
                Vec::new()
            }
        }
    }
}

/// `PT1H2M3S` → `1:02:03`, `PT4M13S` → `4:13`.
pub fn format_iso_duration(iso: &str) -> Option<String> {
    let rest = iso.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut days = 0u64;
    let mut num = String::new();
    for c in date.chars() {
        match c {
            '0'..='9' => num.push(c),
            'D' => days = std::mem::take(&mut num).parse().ok()?,
            _ => return None,
        }
    }

    let (mut h, mut m, mut s) = (0u64, 0u64, 0u64);
    for c in time.chars() {
        match c {
            '0'..='9' => num.push(c),
            'H' => h = std::mem::take(&mut num).parse().ok()?,
            'M' => m = std::mem::take(&mut num).parse().ok()?,
            'S' => s = std::mem::take(&mut num).parse().ok()?,
            _ => return None,
        }
    }
    if !num.is_empty() {
        return None;
    }

    let h = h + days * 24;
    Some(if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    })
}

// ── API response shapes ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    content_details: ContentDetails,
    #[serde(default)]
    statistics: Statistics,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    #[serde(default)]
    view_count: String,
}
