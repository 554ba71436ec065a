mod common;

use common::*;
use ladok_canvas_core::contract::{HttpRequest, HttpResponse, Method};
use ladok_canvas_core::paginate::fetch_all;
use ladok_canvas_core::Error;
use serde_json::{json, Value};

const FIRST: &str = "https://canvas.example/api/v1/courses/7/enrollments";

fn page(ids: std::ops::Range<u64>, next: Option<&str>) -> HttpResponse {
    let items: Vec<Value> = ids.map(|id| json!({"id": id})).collect();
    let mut response = json_ok(&Value::Array(items));
    if let Some(next) = next {
        response
            .headers
            .push(("link".to_string(), format!(r#"<{next}>; rel="next", <{FIRST}?page=1>; rel="first""#)));
    }
    response
}

fn page_url(n: u32) -> String {
    format!("{FIRST}?page={n}&per_page=100")
}

fn first_request() -> HttpRequest {
    HttpRequest::get(FIRST)
        .query("per_page", "100")
        .header("Authorization", "Bearer t0ken")
}

#[tokio::test]
async fn follows_next_links_until_the_last_page() {
    let (p2, p3) = (page_url(2), page_url(3));
    let routes = Routes::new()
        .on(Method::Get, FIRST, move |_| page(0..100, Some(&p2)))
        .on(Method::Get, &page_url(2), move |_| page(100..200, Some(&p3)))
        .on(Method::Get, &page_url(3), |_| page(200..237, None));
    let (mock, recorded) = transport(routes);

    let items: Vec<Value> = fetch_all(&mock, first_request()).await.unwrap();
    assert_eq!(items.len(), 237);
    let ids: Vec<u64> = items.iter().map(|i| i["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, (0..237).collect::<Vec<_>>());

    let requests = recorded.requests();
    assert_eq!(requests.len(), 3);
    // Follow-ups reuse the headers and rely on the link for the query.
    for follow_up in &requests[1..] {
        assert!(follow_up.query.is_empty());
        assert_eq!(header(follow_up, "Authorization"), Some("Bearer t0ken"));
    }
}

#[tokio::test]
async fn failed_initial_request_yields_nothing() {
    let routes = Routes::new().on(Method::Get, FIRST, |_| status(403));
    let (mock, recorded) = transport(routes);

    let items: Vec<Value> = fetch_all(&mock, first_request()).await.unwrap();
    assert!(items.is_empty());
    assert_eq!(recorded.count(), 1);
}

#[tokio::test]
async fn failed_follow_up_page_is_an_error() {
    let p2 = page_url(2);
    let routes = Routes::new()
        .on(Method::Get, FIRST, move |_| page(0..100, Some(&p2)))
        .on(Method::Get, &page_url(2), |_| status(500));
    let (mock, _recorded) = transport(routes);

    let err = fetch_all::<_, Value>(&mock, first_request()).await.unwrap_err();
    match err {
        Error::RemoteRequestFailed { url, reason } => {
            assert_eq!(url, page_url(2));
            assert!(reason.contains("500"), "{reason}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}
