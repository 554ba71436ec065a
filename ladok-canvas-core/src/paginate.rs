//! Link-header pagination for list endpoints.
//!
//! The initial request decides whether there is anything to fetch at all: a
//! non-success status yields an empty list. Once the first page succeeded,
//! each `rel="next"` link is followed with the same headers and no query
//! parameters (the link already carries them). A failed follow-up page is a
//! hard error.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::contract::{HttpRequest, HttpTransport};
use crate::error::{Error, Result};

pub async fn fetch_all<T, R>(transport: &T, request: HttpRequest) -> Result<Vec<R>>
where
    T: HttpTransport + ?Sized,
    R: DeserializeOwned,
{
    let headers = request.headers.clone();
    let first_url = request.url.clone();
    let mut response = transport.send(request).await?;
    if !response.is_success() {
        warn!(url = %first_url, status = response.status, "List request failed, returning no items");
        return Ok(Vec::new());
    }

    let mut items: Vec<R> = response.json()?;
    let mut pages = 1;
    while let Some(next) = response.header("link").and_then(next_link) {
        debug!(next = %next, pages, items = items.len(), "Following next page link");
        response = transport
            .send(HttpRequest::get(&next).headers(&headers))
            .await?;
        if !response.is_success() {
            return Err(Error::remote(
                next,
                format!("HTTP status {} on page {}", response.status, pages + 1),
            ));
        }
        let page: Vec<R> = response.json()?;
        items.extend(page);
        pages += 1;
    }
    debug!(url = %first_url, pages, items = items.len(), "Fetched all pages");
    Ok(items)
}

/// URL of the `rel="next"` entry in an RFC 8288 `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_link_picks_next_relation() {
        let header = r#"<https://canvas.example/api/v1/courses/1/enrollments?page=1&per_page=100>; rel="current",<https://canvas.example/api/v1/courses/1/enrollments?page=2&per_page=100>; rel="next",<https://canvas.example/api/v1/courses/1/enrollments?page=1&per_page=100>; rel="first""#;
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://canvas.example/api/v1/courses/1/enrollments?page=2&per_page=100")
        );
    }

    #[test]
    fn next_link_absent_on_last_page() {
        let header = r#"<https://canvas.example/x?page=3>; rel="current", <https://canvas.example/x?page=1>; rel="first", <https://canvas.example/x?page=3>; rel="last""#;
        assert_eq!(next_link(header), None);
    }
}
