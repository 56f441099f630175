//! In-memory stand-in for the channel API.
//!
//! Serves the three endpoints the load generator calls:
//!
//! - `PUT /v1/channels` creates a channel and returns `{"id": ...}`.
//! - `POST /v1/channels/{id}/subscriptions` subscribes `{id}` to the channel
//!   named in the body; `404` if `{id}` is unknown.
//! - `GET /v1/channels/{id}/subscriptions` lists what `{id}` is subscribed
//!   to, or JSON `null` if `{id}` is unknown.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
};
use parking_lot::RwLock;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateChannelResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub channel_id: String,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Default)]
struct Channels {
    names: HashMap<String, String>,
    subscriptions: HashMap<String, Vec<String>>,
}

/// Shared, cloneable mock state.
#[derive(Clone, Default)]
pub struct MockState {
    channels: Arc<RwLock<Channels>>,
}

impl MockState {
    pub fn channel_count(&self) -> usize {
        self.channels.read().names.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.channels
            .read()
            .subscriptions
            .values()
            .map(Vec::len)
            .sum()
    }
}

/// Builds the mock router over `state`.
pub fn router(state: MockState) -> Router {
    Router::new()
        .route("/v1/channels", put(create_channel))
        .route(
            "/v1/channels/{id}/subscriptions",
            post(create_subscription).get(list_subscriptions),
        )
        .with_state(state)
}

async fn create_channel(
    State(state): State<MockState>,
    Json(req): Json<CreateChannelRequest>,
) -> Json<CreateChannelResponse> {
    let id = format!("{:032x}", rng().random::<u128>());
    tracing::debug!("PUT /v1/channels `{}` -> `{id}`", req.name);

    let mut channels = state.channels.write();
    channels.names.insert(id.clone(), req.name);
    channels.subscriptions.insert(id.clone(), Vec::new());

    Json(CreateChannelResponse { id })
}

async fn create_subscription(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Json(req): Json<CreateSubscriptionRequest>,
) -> StatusCode {
    tracing::debug!(
        "POST /v1/channels/{id}/subscriptions -> `{}` at {}",
        req.channel_id,
        req.created_at
    );

    let mut channels = state.channels.write();
    match channels.subscriptions.get_mut(&id) {
        Some(subscribed) => {
            subscribed.push(req.channel_id);
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn list_subscriptions(
    State(state): State<MockState>,
    Path(id): Path<String>,
) -> Json<Option<Vec<Subscription>>> {
    tracing::debug!("GET /v1/channels/{id}/subscriptions");

    let channels = state.channels.read();
    let listing = channels.subscriptions.get(&id).map(|subscribed| {
        subscribed
            .iter()
            .map(|to| Subscription {
                id: to.clone(),
                name: channels.names.get(to).cloned().unwrap_or_default(),
            })
            .collect()
    });

    Json(listing)
}
