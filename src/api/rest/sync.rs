use std::sync::Arc;

use axum::{
    extract::Extension,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use futures::{stream, Stream};
use serde_json::{json, Value};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, info};

use crate::{
    domain::models::SyncStats,
    infrastructure::state::AppState,
    services::{
        errors::SyncError,
        progress::{ChannelProgress, ProgressEvent, TracingProgress},
        sync::SyncService,
    },
};

use super::{sync_failure, ErrorResponse};

pub fn router() -> Router {
    Router::new()
        .route("/", post(run_sync))
        .route("/stream", post(run_sync_stream))
}

async fn run_sync(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ErrorResponse> {
    let service = SyncService::from_state(&state);
    match service.run(&TracingProgress).await {
        Ok(stats) => {
            info!(?stats, "manual sync completed");
            Ok(Json(json!({
                "success": true,
                "stats": stats,
                "timestamp": Utc::now().to_rfc3339(),
            })))
        }
        Err(err) => {
            error!(error = %err, "manual sync failed");
            Err(sync_failure(&err))
        }
    }
}

enum StreamState {
    Running {
        receiver: mpsc::UnboundedReceiver<ProgressEvent>,
        task: JoinHandle<Result<SyncStats, SyncError>>,
    },
    Finished,
}

/// Streams progress frames, then one terminal frame. The sync keeps running
/// if the client disconnects.
async fn run_sync_stream(
    Extension(state): Extension<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (sender, receiver) = mpsc::unbounded_channel();
    let service = SyncService::from_state(&state);
    let task = tokio::spawn(async move {
        let sink = ChannelProgress::new(sender);
        service.run(&sink).await
    });

    let frames = stream::unfold(StreamState::Running { receiver, task }, |step| async move {
        match step {
            StreamState::Running { mut receiver, task } => match receiver.recv().await {
                Some(event) => Some((
                    Event::default().json_data(&event),
                    StreamState::Running { receiver, task },
                )),
                None => {
                    let outcome = match task.await {
                        Ok(outcome) => outcome,
                        Err(err) => Err(SyncError::Persistence(format!("sync task failed: {err}"))),
                    };
                    Some((
                        Event::default().json_data(terminal_frame(outcome)),
                        StreamState::Finished,
                    ))
                }
            },
            StreamState::Finished => None,
        }
    });

    Sse::new(frames).keep_alive(KeepAlive::default())
}

fn terminal_frame(outcome: Result<SyncStats, SyncError>) -> Value {
    match outcome {
        Ok(stats) => {
            info!(?stats, "streamed sync completed");
            json!({
                "success": true,
                "stats": stats,
                "timestamp": Utc::now().to_rfc3339(),
                "message": "Sync completed successfully!",
                "progress": 100,
            })
        }
        Err(err) => {
            error!(error = %err, "streamed sync failed");
            json!({
                "success": false,
                "error": err.to_string(),
                "message": format!("Error: {err}"),
                "progress": null,
            })
        }
    }
}
