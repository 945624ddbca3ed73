use std::collections::HashSet;
use std::future::Future;

use reqwest::Url;

use crate::{BridgeError, Result};

/// Cursor handed from one page to the next. OSS embeds it as the `startAt`
/// query parameter of the page's `next` link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub const QUERY_KEY: &'static str = "startAt";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `None` when the page was the last one (`next` absent or blank).
    pub fn from_next_link(next: Option<&str>) -> Result<Option<Self>> {
        let Some(next) = next.map(str::trim).filter(|next| !next.is_empty()) else {
            return Ok(None);
        };

        // Relative links are resolved against a throwaway base; only the query matters.
        let url = Url::parse(next)
            .or_else(|_| Url::parse("http://placeholder.invalid/").and_then(|base| base.join(next)))
            .map_err(|err| {
                BridgeError::InvalidResponse(format!("unparsable next link {next:?}: {err}"))
            })?;

        let start_at = url
            .query_pairs()
            .find(|(key, _)| key == Self::QUERY_KEY)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                BridgeError::InvalidResponse(format!(
                    "next link {next:?} has no {} parameter",
                    Self::QUERY_KEY
                ))
            })?;
        Ok(Some(Self(start_at)))
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<ContinuationToken>,
}

/// Fetches pages one after another, feeding each page's cursor into the next
/// request, and concatenates the items in order. A cursor that was already
/// followed ends the listing with `InvalidResponse`.
pub async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<ContinuationToken>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut out = Vec::new();
    let mut cursor: Option<ContinuationToken> = None;
    let mut followed = HashSet::<ContinuationToken>::new();
    let mut pages = 0usize;

    loop {
        let page = fetch_page(cursor.clone()).await?;
        pages += 1;
        out.extend(page.items);

        match page.next {
            None => break,
            Some(next) if followed.contains(&next) => {
                return Err(BridgeError::InvalidResponse(format!(
                    "pagination cursor {:?} repeated after {pages} pages",
                    next.as_str()
                )));
            }
            Some(next) => {
                followed.insert(next.clone());
                cursor = Some(next);
            }
        }
    }

    tracing::debug!(pages, items = out.len(), "collected paginated listing");
    Ok(out)
}
