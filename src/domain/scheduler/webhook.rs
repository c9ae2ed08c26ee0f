//! HTTP listener for push-triggered tempering events.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::api::event_dto::{EventDto, EventReplyDto, HealthDto};
use crate::domain::scheduler::scheduler::{Dispatch, Scheduler};
use crate::domain::utils::id::NodeName;

pub fn router(scheduler: Arc<Scheduler>) -> Router {
    Router::new().route("/events", post(post_event)).route("/health", get(health)).with_state(scheduler)
}

async fn post_event(State(scheduler): State<Arc<Scheduler>>, Json(event): Json<EventDto>) -> (StatusCode, Json<EventReplyDto>) {
    let bundles = if event.bundles.is_empty() { scheduler.config().bundles.clone() } else { event.bundles };
    let reply = |status: &str, message: Option<String>| EventReplyDto { node: event.node.clone(), status: status.to_string(), message };

    if event.node.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(reply("rejected", Some("node name is empty".to_string()))));
    }

    match scheduler.dispatch(NodeName::new(event.node.as_str()), &bundles) {
        Ok(Dispatch::Started(_)) => {
            log::info!("Event for node {} dispatched with bundles {:?}.", event.node, bundles);
            (StatusCode::ACCEPTED, Json(reply("dispatched", None)))
        }
        Ok(Dispatch::AlreadyRunning) => (StatusCode::CONFLICT, Json(reply("already-running", None))),
        Err(e) => {
            log::warn!("Event for node {} rejected: {}", event.node, e);
            (StatusCode::BAD_REQUEST, Json(reply("rejected", Some(e.to_string()))))
        }
    }
}

async fn health(State(scheduler): State<Arc<Scheduler>>) -> Json<HealthDto> {
    Json(HealthDto { status: "ok".to_string(), in_progress: scheduler.in_progress().len() })
}

/// Serves the event listener on `addr` until `shutdown` fires.
pub async fn serve(addr: &str, scheduler: Arc<Scheduler>, shutdown: CancellationToken) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("Event listener on http://{}", addr);

    axum::serve(listener, router(scheduler)).with_graceful_shutdown(shutdown.cancelled_owned()).await
}
