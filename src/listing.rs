//! Search, pagination and small display helpers shared by the list screens.
//!
//! Lists are fetched whole from the backend and narrowed down here, the same
//! way for every screen: substring filter, then a fixed-size page slice.

use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Query string of every list screen: `?q=...&page=...&edit=...`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub edit: Option<i64>,
    #[serde(default)]
    pub new: Option<bool>,
}

/// Case-insensitive substring match over any of the fields `key` returns.
pub fn filter<T, F>(items: Vec<T>, query: &str, key: F) -> Vec<T>
where
    F: Fn(&T) -> Vec<String>,
{
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| key(item).iter().any(|f| f.to_lowercase().contains(&needle)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    pub number: usize,
    pub current: bool,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    /// Slices out page `page` (1-based).
    ///
    /// A page past the end falls back to the first page, as does page 0.
    pub fn paginate(items: Vec<T>, page: Option<usize>, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total_items = items.len();
        let total_pages = total_items.div_ceil(per_page);

        let mut current = page.unwrap_or(1).max(1);
        if current > total_pages && total_pages > 0 {
            current = 1;
        }

        let start = (current - 1) * per_page;
        let items = items.into_iter().skip(start).take(per_page).collect();

        Self {
            items,
            current,
            total_pages,
            total_items,
        }
    }

    pub fn has_prev(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total_pages
    }

    pub fn prev(&self) -> usize {
        self.current.saturating_sub(1).max(1)
    }

    pub fn next(&self) -> usize {
        (self.current + 1).min(self.total_pages.max(1))
    }

    pub fn links(&self) -> Vec<PageLink> {
        (1..=self.total_pages)
            .map(|number| PageLink {
                number,
                current: number == self.current,
            })
            .collect()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            current: self.current,
            total_pages: self.total_pages,
            total_items: self.total_items,
        }
    }
}

/// Shortens `s` to `n` characters, ending in `...` when cut.
pub fn truncate(s: &str, n: usize) -> String {
    if s.chars().count() > n {
        let kept: String = s.chars().take(n.saturating_sub(1)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}

/// True for absolute `http(s)` URLs, the only evidence links that are rendered.
pub fn is_web_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Reads an `evidencias` field: a JSON array of URLs, or a single bare URL.
///
/// Entries that are not `http(s)` URLs are dropped.
pub fn parse_evidence(raw: Option<&str>) -> Vec<String> {
    let trimmed = raw.unwrap_or_default().trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let urls = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(values)) => values
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .collect(),
        _ => vec![trimmed.to_string()],
    };
    urls.into_iter().filter(|u| is_web_url(u)).collect()
}

/// Encodes evidence URLs the way the backend stores them.
pub fn encode_evidence(urls: &[String]) -> String {
    serde_json::to_string(urls).unwrap_or_else(|_| "[]".to_string())
}

/// Splits a textarea of URLs (one per line) into a clean list of `http(s)` links.
pub fn evidence_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| is_web_url(l))
        .map(String::from)
        .collect()
}

/// True when another record (not `editing`) already uses `candidate` as its name.
pub fn is_duplicate_name<'a>(
    existing: impl IntoIterator<Item = (i64, &'a str)>,
    candidate: &str,
    editing: Option<i64>,
) -> bool {
    let normalized = candidate.trim().to_lowercase();
    existing
        .into_iter()
        .any(|(id, name)| name.trim().to_lowercase() == normalized && Some(id) != editing)
}

/// Trims a form field, mapping blank input to `None`.
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses an id coming from a `<select>`; blank or garbage is `None`.
pub fn parse_id(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}

/// Builds a list-screen URL keeping the search term. `base` may carry its own query.
pub fn list_url(base: &str, q: &str, page: usize) -> String {
    let page = page.to_string();
    let mut params = vec![("page", page.as_str())];
    if !q.is_empty() {
        params.push(("q", q));
    }
    let query = serde_urlencoded::to_string(&params).unwrap_or_default();
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, sep, query)
}
