//! Streaming helper for iterating the Qdrant scroll endpoint without manual loops.

use async_stream::try_stream;
use futures_core::Stream;
use reqwest::Method;
use serde_json::{Map, Value, json};

use super::client::QdrantService;
use super::types::{QdrantError, ScrollResponse};

const DEFAULT_SCROLL_LIMIT: usize = 512;

/// Stream Qdrant payloads for a collection using the scroll API.
pub fn stream_payloads<'a>(
    service: &'a QdrantService,
    collection: &'a str,
    with_payload: Value,
    filter: Option<Value>,
) -> impl Stream<Item = Result<Map<String, Value>, QdrantError>> + 'a {
    try_stream! {
        let mut offset: Option<Value> = None;
        let filter_body = filter.unwrap_or_else(|| json!({ "must": [] }));

        loop {
            let body = json!({
                "with_payload": with_payload.clone(),
                "with_vector": false,
                "limit": DEFAULT_SCROLL_LIMIT,
                "filter": filter_body.clone(),
                "offset": offset.clone().unwrap_or(Value::Null),
            });

            let response = service
                .request(Method::POST, &format!("collections/{collection}/points/scroll"))
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let ScrollResponse { result } = response.json().await?;
                for point in result.points {
                    if let Some(payload) = point.payload {
                        yield payload;
                    }
                }

                match result.next_page_offset {
                    Some(next) if !next.is_null() => offset = Some(next),
                    _ => break,
                }
            } else {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(collection = collection, status = %status, "Failed to scroll payloads via stream");
                Err(QdrantError::UnexpectedStatus { status, body })?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{pin_mut, stream::StreamExt};
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn stream_payloads_collects_multiple_pages() {
        let server = MockServer::start_async().await;
        let service = QdrantService {
            client: reqwest::Client::builder()
                .user_agent("examforge-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        };

        let first = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/jee_books/points/scroll")
                    .body_contains("\"offset\":null");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            { "payload": { "source_book": "Irodov" } }
                        ],
                        "next_page_offset": "b9b6c7a0-0000-0000-0000-000000000000"
                    }
                }));
            })
            .await;

        let second = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/jee_books/points/scroll")
                    .body_contains("\"offset\":\"b9b6c7a0-0000-0000-0000-000000000000\"");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            { "payload": { "source_book": "HC Verma" } }
                        ],
                        "next_page_offset": null
                    }
                }));
            })
            .await;

        let stream = stream_payloads(&service, "jee_books", json!(["source_book"]), None);
        pin_mut!(stream);
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item.expect("payload"));
        }

        first.assert();
        second.assert();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["source_book"], "Irodov");
        assert_eq!(items[1]["source_book"], "HC Verma");
    }
}
