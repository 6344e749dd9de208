//! Integration tests for the chat relay endpoint

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use futures::StreamExt;
    use mockito::Matcher;
    use serde_json::json;
    use tower::util::ServiceExt;

    use crate::test_utils::{
        TEST_API_KEY, body_to_string, sse_body, sse_error, stream_path, test_app, test_config,
    };

    fn chat_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .uri("/api/chat")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Tests the relay forwards provider deltas as plain text
    #[tokio::test]
    async fn it_streams_provider_text_as_plain_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", stream_path().as_str())
            .match_query(Matcher::UrlEncoded("alt".into(), "sse".into()))
            .match_header("x-goog-api-key", TEST_API_KEY)
            .match_body(Matcher::Json(json!({
                "contents": [{"role": "user", "parts": [{"text": "Hi"}]}]
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_body(&["Hel", "lo!"]))
            .create_async()
            .await;

        let app = test_app(test_config(&server.url(), Some(TEST_API_KEY)));
        let response = app
            .oneshot(chat_request(json!({"message": "Hi", "history": []})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );

        let body = body_to_string(response.into_body()).await;
        assert_eq!(body, "Hello!");
        mock.assert_async().await;
    }

    /// Tests prior turns are sent ahead of the new message
    #[tokio::test]
    async fn it_sends_history_before_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", stream_path().as_str())
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "Hi"}]},
                    {"role": "model", "parts": [{"text": "Hello!"}]},
                    {"role": "user", "parts": [{"text": "How are you?"}]}
                ]
            })))
            .with_status(200)
            .with_body(sse_body(&["Great"]))
            .create_async()
            .await;

        let app = test_app(test_config(&server.url(), Some(TEST_API_KEY)));
        let response = app
            .oneshot(chat_request(json!({
                "message": "How are you?",
                "history": [
                    {"role": "user", "parts": [{"text": "Hi"}]},
                    {"role": "model", "parts": [{"text": "Hello!"}]}
                ]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_to_string(response.into_body()).await, "Great");
        mock.assert_async().await;
    }

    /// Tests a missing API key fails the request without calling the provider
    #[tokio::test]
    async fn it_fails_without_api_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let app = test_app(test_config(&server.url(), None));
        let response = app
            .oneshot(chat_request(json!({"message": "Hi", "history": []})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("GEMINI_API_KEY"));
        mock.assert_async().await;
    }

    /// Tests a provider rejection fails the request before streaming
    #[tokio::test]
    async fn it_fails_when_provider_rejects_request() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", stream_path().as_str())
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"message":"API key not valid"}}"#)
            .create_async()
            .await;

        let app = test_app(test_config(&server.url(), Some("bad-key")));
        let response = app
            .oneshot(chat_request(json!({"message": "Hi", "history": []})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("API key not valid"));
    }

    /// Tests a provider error mid-stream delivers the partial output
    /// and then terminates the body with an error
    #[tokio::test]
    async fn it_truncates_stream_on_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let body = format!("{}{}", sse_body(&["Par"]), sse_error("backend failed"));
        let _mock = server
            .mock("POST", stream_path().as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let app = test_app(test_config(&server.url(), Some(TEST_API_KEY)));
        let response = app
            .oneshot(chat_request(json!({"message": "Hi", "history": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut stream = response.into_body().into_data_stream();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"Par");
        assert!(stream.next().await.unwrap().is_err());
    }

    /// Tests requests without a message are rejected
    #[tokio::test]
    async fn it_rejects_missing_message() {
        let app = test_app(test_config("http://127.0.0.1:1", Some(TEST_API_KEY)));
        let response = app
            .oneshot(chat_request(json!({"history": []})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
