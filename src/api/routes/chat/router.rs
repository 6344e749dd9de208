//! Router for the chat relay

use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::core::AppConfig;
use crate::gemini::{forward_stream, start_stream};

type SharedState = Arc<RwLock<AppState>>;

/// Holds an error back for one poll so the server writes out the
/// chunks it already took from the stream before aborting the body.
struct FlushBeforeError<S, E> {
    inner: S,
    held: Option<E>,
}

impl<S, E> FlushBeforeError<S, E> {
    fn new(inner: S) -> Self {
        Self { inner, held: None }
    }
}

impl<S, T, E> Stream for FlushBeforeError<S, E>
where
    S: Stream<Item = Result<T, E>> + Unpin,
    E: Unpin,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(err) = this.held.take() {
            return Poll::Ready(Some(Err(err)));
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Err(err))) => {
                this.held = Some(err);
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            other => other,
        }
    }
}

/// Relay a message and its history to the model and stream the
/// answer back as plain text
async fn chat_handler(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let config: AppConfig = state
        .read()
        .expect("Unable to read share state")
        .config
        .clone();

    // Fail before any streaming starts
    let api_key = config.require_api_key().map_err(ApiError::unavailable)?;

    let contents = payload.contents();
    tracing::debug!(
        "Relaying message with {} prior turns to {}",
        payload.history.len(),
        config.gemini_model
    );
    let upstream = start_stream(
        &contents,
        &config.gemini_api_hostname,
        api_key,
        &config.gemini_model,
    )
    .await
    .map_err(ApiError::bad_gateway)?;

    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        match forward_stream(upstream, tx.clone()).await {
            Ok(text) => {
                tracing::debug!("Relayed {} bytes", text.len());
            }
            Err(e) => {
                tracing::error!("Chat relay error: {}. Root cause: {}", e, e.root_cause());
                // Terminates the response body early
                let _ = tx.send(Err(e));
            }
        }
    });

    let body = Body::from_stream(FlushBeforeError::new(UnboundedReceiverStream::new(rx)));
    let resp = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)?;

    Ok(resp)
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(chat_handler))
}
