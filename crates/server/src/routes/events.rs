// crates/server/src/routes/events.rs
//! Per-job SSE progress stream.
//!
//! - GET /pipeline/{job_id}/events - progress events until a terminal one

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;

use worldsmith_types::JobStatus;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// SSE event name for a progress event, by stage.
fn event_name(stage: JobStatus) -> &'static str {
    match stage {
        JobStatus::Complete => "complete",
        JobStatus::Error => "error",
        JobStatus::Cancelled => "cancelled",
        _ => "progress",
    }
}

/// GET /api/pipeline/{job_id}/events - SSE stream of progress events.
///
/// Delivery is best-effort: only events published while subscribed are seen,
/// and there is no replay. A client that connects late should poll status
/// for current state first. The stream ends after a terminal event or when
/// the job's channel is retired.
async fn stream_events(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>> {
    if state.store.get(&job_id).is_none() {
        return Err(ApiError::JobNotFound(job_id));
    }
    let mut rx = state.publisher.subscribe(&job_id);

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let terminal = event.stage.is_terminal();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            yield Ok(Event::default().event(event_name(event.stage)).data(json));
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize progress event");
                        }
                    }
                    if terminal {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(job_id = %job_id, skipped, "progress subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

/// Build the events router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/pipeline/{job_id}/events", get(stream_events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use worldsmith_types::{Job, ProgressEvent, Quality};

    fn app(state: Arc<AppState>) -> Router {
        Router::new().nest("/api", router()).with_state(state)
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_name(JobStatus::CreatingWorld), "progress");
        assert_eq!(event_name(JobStatus::Complete), "complete");
        assert_eq!(event_name(JobStatus::Error), "error");
        assert_eq!(event_name(JobStatus::Cancelled), "cancelled");
    }

    #[tokio::test]
    async fn test_events_unknown_job_is_404() {
        let response = app(test_state())
            .oneshot(
                Request::builder()
                    .uri("/api/pipeline/nope/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_carries_events_and_ends_after_terminal() {
        let state = test_state();
        state.store.create(Job::new(
            "j-1",
            "ancient rome",
            Quality::Standard,
            "user-1",
        ));

        let publisher = Arc::clone(&state.publisher);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            publisher.publish(ProgressEvent::new(
                "j-1",
                JobStatus::CreatingWorld,
                55,
                "generating world",
            ));
            publisher.publish(ProgressEvent::new(
                "j-1",
                JobStatus::Complete,
                100,
                "world ready",
            ));
        });

        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/pipeline/j-1/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The body future resolves because the stream breaks on the
        // terminal event.
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("event: progress"));
        assert!(text.contains("\"progress\":55"));
        assert!(text.contains("event: complete"));
        assert!(text.contains("\"progress\":100"));
    }
}
