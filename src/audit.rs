//! Enumerates published content per site: stories by year, videos up to a cutoff date.
//!
//! The search endpoint refuses to page past `max_result_window` hits, so a
//! date window with more hits than that is bisected by publish date until
//! every window fits.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::arc::{ApiError, ContentApi, SearchQuery, SearchResponse, Story};
use crate::error::AppError;
use crate::state_machine::{ContentItem, LifecycleState};
use crate::throttle::Governor;

const STORY_FIELDS: &[&str] = &[
    "_id",
    "publish_date",
    "canonical_url",
    "website_url",
    "display_url",
    "url",
    "websites",
];

const LOOKUP_FIELDS: &[&str] = &["_id", "type", "publish_date", "headlines"];

/// ANS content type an [`Auditor`] searches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    Story,
    Video,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Story => "story",
            ContentType::Video => "video",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a `YEARS_TO_AUDIT`-style list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearSpec {
    Year(i32),
    /// Inclusive range.
    Range(i32, i32),
    /// `2021-`: from that year back to the site's oldest story.
    OpenEnded(i32),
}

/// Parse `"2022"`, `"2022,2023"`, `"2018-2024"` or `"2021-"` (and mixes of them).
pub fn parse_years(spec: &str) -> Result<Vec<YearSpec>, AppError> {
    let bad = |part: &str| AppError::Config(format!("invalid year spec: {part}"));
    let parse = |s: &str, part: &str| s.trim().parse::<i32>().map_err(|_| bad(part));

    spec.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|part| match part.split_once('-') {
            None => Ok(YearSpec::Year(parse(part, part)?)),
            Some((start, "")) => Ok(YearSpec::OpenEnded(parse(start, part)?)),
            Some((start, end)) => {
                let (start, end) = (parse(start, part)?, parse(end, part)?);
                if start > end {
                    return Err(bad(part));
                }
                Ok(YearSpec::Range(start, end))
            }
        })
        .collect()
}

/// Parse an ANS publish date; accepts RFC 3339 and offset-less timestamps.
pub fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = raw.split('+').next().unwrap_or(raw).trim_end_matches('Z');
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

fn format_ts(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn window_query(content_type: ContentType, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "type:{content_type} AND publish_date:[{} TO {}]",
        format_ts(start),
        format_ts(end)
    )
}

fn year_bounds(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)?.and_hms_opt(23, 59, 59)?;
    Some((start.and_utc(), end.and_utc()))
}

pub struct Auditor<'a, A> {
    api: &'a A,
    governor: &'a Governor,
    page_size: u32,
    max_result_window: u64,
    content_type: ContentType,
}

impl<'a, A: ContentApi> Auditor<'a, A> {
    pub fn new(api: &'a A, governor: &'a Governor, page_size: u32, max_result_window: u64) -> Self {
        Self {
            api,
            governor,
            page_size: page_size.max(1),
            max_result_window: max_result_window.max(1),
            content_type: ContentType::Story,
        }
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    async fn page(&self, query: &SearchQuery) -> Result<SearchResponse, ApiError> {
        let api = self.api;
        self.governor.call("search", || api.search_page(query)).await
    }

    /// Every published item of `site` in `year`, oldest first.
    pub async fn search(&self, site: &str, year: i32) -> Result<Vec<ContentItem>, AppError> {
        let (start, end) = year_bounds(year)
            .ok_or_else(|| AppError::Config(format!("year out of range: {year}")))?;
        info!(site, year, content_type = %self.content_type, "auditing");
        let items = self.collect_range(site, start, end).await?;
        info!(site, year, found = items.len(), "audit finished");
        Ok(items)
    }

    /// Every published item of `site` from its oldest one up to `cutoff`, oldest first.
    ///
    /// The window is `[oldest, min(newest, cutoff)]`; a site whose oldest item
    /// is already past the cutoff yields nothing.
    pub async fn search_until(
        &self,
        site: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ContentItem>, AppError> {
        let Some(oldest) = self.extreme_publish_date(site, true).await? else {
            debug!(site, content_type = %self.content_type, "nothing published");
            return Ok(Vec::new());
        };
        let Some(newest) = self.extreme_publish_date(site, false).await? else {
            return Ok(Vec::new());
        };
        let end = newest.min(cutoff);
        if oldest > end {
            info!(site, oldest = %format_ts(oldest), cutoff = %format_ts(cutoff), "everything is newer than the cutoff");
            return Ok(Vec::new());
        }

        info!(site, from = %format_ts(oldest), to = %format_ts(end), content_type = %self.content_type, "auditing");
        let items = self.collect_range(site, oldest, end).await?;
        info!(site, found = items.len(), "audit finished");
        Ok(items)
    }

    /// Walk `[start, end]`, splitting any window that exceeds the result window.
    async fn collect_range(
        &self,
        site: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ContentItem>, AppError> {
        // Stack of date windows; the left half is pushed last so windows come out in order.
        let mut windows = vec![(start, end)];
        let mut items = Vec::new();
        while let Some((from, to)) = windows.pop() {
            let q = window_query(self.content_type, from, to);
            let base = SearchQuery::new(site, q.as_str())
                .size(self.page_size)
                .include(STORY_FIELDS);
            let first = self.page(&base).await?;
            let count = first.count;
            debug!(site, window = %q, count, "window counted");
            if count == 0 {
                continue;
            }
            if count > self.max_result_window {
                if to - from > TimeDelta::seconds(1) {
                    let mid = from + (to - from) / 2;
                    windows.push((mid + TimeDelta::seconds(1), to));
                    windows.push((from, mid));
                    continue;
                }
                warn!(site, window = %q, count, "window cannot be split further, truncating");
            }

            let limit = count.min(self.max_result_window);
            let mut offset = first.content_elements.len() as u64;
            items.extend(to_items(site, first.content_elements));
            while offset < limit {
                let page = self.page(&base.clone().from_offset(offset)).await?;
                if page.content_elements.is_empty() {
                    break;
                }
                offset += page.content_elements.len() as u64;
                items.extend(to_items(site, page.content_elements));
            }
        }

        items.sort_by_key(|item| item.publish_date.as_deref().and_then(parse_publish_date));
        Ok(items)
    }

    /// Publish date of the oldest (`ascending`) or newest item on `site`.
    pub async fn extreme_publish_date(
        &self,
        site: &str,
        ascending: bool,
    ) -> Result<Option<DateTime<Utc>>, ApiError> {
        let order = if ascending { "asc" } else { "desc" };
        let query = SearchQuery::new(site, format!("type:{}", self.content_type))
            .size(1)
            .include(&["_id", "publish_date"])
            .sort(format!("publish_date:{order}"));
        let page = self.page(&query).await?;
        Ok(page
            .content_elements
            .first()
            .and_then(|s| s.publish_date.as_deref())
            .and_then(parse_publish_date))
    }

    /// Year of the oldest item on `site`, if it has any.
    pub async fn earliest_year(&self, site: &str) -> Result<Option<i32>, ApiError> {
        Ok(self
            .extreme_publish_date(site, true)
            .await?
            .map(|dt| dt.year()))
    }

    /// Concrete years for `site`, newest first, without duplicates.
    pub async fn resolve_years(&self, site: &str, specs: &[YearSpec]) -> Result<Vec<i32>, ApiError> {
        let mut years = Vec::new();
        for spec in specs {
            match *spec {
                YearSpec::Year(y) => years.push(y),
                YearSpec::Range(start, end) => years.extend(start..=end),
                YearSpec::OpenEnded(start) => match self.earliest_year(site).await? {
                    Some(oldest) => years.extend(oldest..=start),
                    None => debug!(site, "no stories, skipping open-ended range"),
                },
            }
        }
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        Ok(years)
    }

    /// Look a single story up by id.
    pub async fn lookup(&self, site: &str, story_id: &str) -> Result<Option<Story>, ApiError> {
        let query = SearchQuery::new(site, format!("_id:{story_id}"))
            .size(1)
            .include(LOOKUP_FIELDS);
        let page = self.page(&query).await?;
        Ok(page.content_elements.into_iter().next())
    }
}

fn to_items(site: &str, stories: Vec<Story>) -> impl Iterator<Item = ContentItem> + '_ {
    stories.into_iter().filter_map(move |story| {
        let url = story.public_url();
        let id = story.id.filter(|id| !id.is_empty())?;
        Some(ContentItem {
            id,
            state: LifecycleState::Published,
            site: Some(site.to_string()),
            publish_date: story.publish_date,
            url,
        })
    })
}
