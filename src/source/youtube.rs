use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;

use crate::source::{MetricSource, VideoStat};

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";
const PAGE_SIZE: usize = 50;

// --- Data API response models. Fields we don't read are omitted; ---
// --- records missing required fields are skipped, never fatal.   ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<SearchItemId>,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: Option<String>,
    snippet: Option<Snippet>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Statistics {
    // The Data API serializes counters as strings.
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
}

/// Parse an ISO-8601 duration (`PT1M30S`) into whole seconds.
/// Returns `None` on anything that doesn't look like a duration.
pub fn parse_iso8601_duration_secs(s: &str) -> Option<u32> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").unwrap()
    });
    let caps = re.captures(s)?;
    if caps
        .iter()
        .skip(1)
        .all(|g| g.is_none())
    {
        // "P" alone is not a duration.
        return None;
    }
    let num = |i: usize| -> u32 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0)
    };
    Some(num(1) * 86_400 + num(2) * 3_600 + num(3) * 60 + num(4))
}

/// YouTube Data API v3 metric source: pages through `search` by upload
/// date and resolves durations/view counts through `videos`.
pub struct YouTubeSource {
    api_key: String,
    client: reqwest::Client,
    max_pages: usize,
    timeout: Duration,
}

impl YouTubeSource {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            max_pages: 10,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    async fn search_page(&self, channel_id: &str, page_token: Option<&str>) -> Result<SearchResponse> {
        let page_size = PAGE_SIZE.to_string();
        let mut req = self
            .client
            .get(SEARCH_URL)
            .timeout(self.timeout)
            .query(&[
                ("part", "snippet"),
                ("channelId", channel_id),
                ("maxResults", page_size.as_str()),
                ("order", "date"),
                ("type", "video"),
                ("key", self.api_key.as_str()),
            ]);
        if let Some(token) = page_token {
            req = req.query(&[("pageToken", token)]);
        }
        let resp = req
            .send()
            .await
            .context("youtube search request")?
            .error_for_status()
            .context("youtube search non-2xx")?;
        resp.json::<SearchResponse>()
            .await
            .context("parsing youtube search response")
    }

    async fn video_details(&self, ids: &[String]) -> Result<Vec<VideoStat>> {
        let joined = ids.join(",");
        let resp = self
            .client
            .get(VIDEOS_URL)
            .timeout(self.timeout)
            .query(&[
                ("part", "contentDetails,statistics,snippet"),
                ("id", joined.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("youtube videos request")?
            .error_for_status()
            .context("youtube videos non-2xx")?;
        let body: VideosResponse = resp
            .json()
            .await
            .context("parsing youtube videos response")?;
        Ok(body.items.into_iter().filter_map(into_stat).collect())
    }
}

/// Validate one raw item into a `VideoStat`; malformed rows are dropped.
fn into_stat(item: VideoItem) -> Option<VideoStat> {
    let id = item.id?;
    let title = item.snippet.and_then(|s| s.title)?;
    let duration_secs = item
        .content_details
        .and_then(|c| c.duration)
        .as_deref()
        .and_then(parse_iso8601_duration_secs)?;
    // A missing viewCount means "not yet counted", not a bad record.
    let view_count = item
        .statistics
        .and_then(|s| s.view_count)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    Some(VideoStat {
        id,
        title,
        duration_secs,
        view_count,
    })
}

#[async_trait]
impl MetricSource for YouTubeSource {
    async fn list_videos(&self, channel_id: &str) -> Result<Vec<VideoStat>> {
        let t0 = std::time::Instant::now();
        let mut all: Vec<VideoStat> = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..self.max_pages {
            let page = match self.search_page(channel_id, page_token.as_deref()).await {
                Ok(p) => p,
                Err(e) if all.is_empty() => return Err(e).context("first search page"),
                Err(e) => {
                    // Keep what the earlier pages already produced.
                    tracing::warn!(error = ?e, channel = channel_id, "search page failed; returning partial results");
                    counter!("source_page_errors_total").increment(1);
                    break;
                }
            };

            let ids: Vec<String> = page
                .items
                .into_iter()
                .filter_map(|it| it.id.and_then(|id| id.video_id))
                .collect();
            if ids.is_empty() {
                break;
            }

            match self.video_details(&ids).await {
                Ok(mut stats) => all.append(&mut stats),
                Err(e) if all.is_empty() => return Err(e).context("first details page"),
                Err(e) => {
                    tracing::warn!(error = ?e, channel = channel_id, "details page failed; returning partial results");
                    counter!("source_page_errors_total").increment(1);
                    break;
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        histogram!("source_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("source_videos_total").increment(all.len() as u64);
        Ok(all)
    }

    fn name(&self) -> &'static str {
        "YouTube"
    }
}
