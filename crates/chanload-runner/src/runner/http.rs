use chanload::{Error, RemoteService, Result};
use core::time::Duration;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize)]
struct CreateChannelBody<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct CreateChannelReply {
    id: String,
}

#[derive(Serialize)]
struct CreateSubscriptionBody<'a> {
    channel_id: &'a str,
    created_at: u64,
}

/// Listing entries also carry a `name`, which is not needed here.
#[derive(Deserialize)]
struct SubscriptionEntry {
    id: String,
}

/// [`RemoteService`] over the channel API's JSON/HTTP endpoints.
///
/// Each request goes to the next host in round-robin order.
pub struct HttpService {
    client: Client,
    hosts: Vec<String>,
    next_host: AtomicUsize,
}

impl HttpService {
    /// Builds a client for `hosts`. Hosts without a scheme get `http://`.
    pub fn new(hosts: &[String], timeout: Duration) -> anyhow::Result<Self> {
        if hosts.is_empty() {
            anyhow::bail!("at least one API host is required");
        }

        let client = Client::builder().timeout(timeout).build()?;
        let hosts = hosts
            .iter()
            .map(|host| {
                let host = host.trim_end_matches('/');
                if host.contains("://") {
                    host.to_owned()
                } else {
                    format!("http://{host}")
                }
            })
            .collect();

        Ok(Self {
            client,
            hosts,
            next_host: AtomicUsize::new(0),
        })
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    fn url(&self, path: &str) -> String {
        let index = self.next_host.fetch_add(1, Ordering::Relaxed) % self.hosts.len();
        format!("{}{path}", self.hosts[index])
    }
}

fn transport(context: &str, err: reqwest::Error) -> Error {
    Error::Transport {
        context: format!("{context}: {err}"),
    }
}

fn check_status(context: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::UnexpectedStatus {
            status: status.as_u16(),
            context: context.to_owned(),
        })
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(context: &str, response: Response) -> Result<T> {
    let body = response.bytes().await.map_err(|err| Error::Decode {
        context: format!("{context}: {err}"),
    })?;
    serde_json::from_slice(&body).map_err(|err| Error::Decode {
        context: format!("{context}: {err}"),
    })
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl RemoteService for HttpService {
    async fn create_channel(&self, name: &str) -> Result<String> {
        const CONTEXT: &str = "PUT /v1/channels";

        let response = self
            .client
            .put(self.url("/v1/channels"))
            .json(&CreateChannelBody { name })
            .send()
            .await
            .map_err(|err| transport(CONTEXT, err))?;
        let reply: CreateChannelReply = decode(CONTEXT, check_status(CONTEXT, response)?).await?;
        Ok(reply.id)
    }

    async fn create_subscription(&self, from: &str, to: &str) -> Result<()> {
        const CONTEXT: &str = "POST /v1/channels/{id}/subscriptions";

        let response = self
            .client
            .post(self.url(&format!("/v1/channels/{from}/subscriptions")))
            .json(&CreateSubscriptionBody {
                channel_id: to,
                created_at: unix_secs(),
            })
            .send()
            .await
            .map_err(|err| transport(CONTEXT, err))?;
        check_status(CONTEXT, response)?;
        Ok(())
    }

    async fn list_subscriptions(&self, channel: &str) -> Result<Option<Vec<String>>> {
        const CONTEXT: &str = "GET /v1/channels/{id}/subscriptions";

        let response = self
            .client
            .get(self.url(&format!("/v1/channels/{channel}/subscriptions")))
            .send()
            .await
            .map_err(|err| transport(CONTEXT, err))?;
        let entries: Option<Vec<SubscriptionEntry>> =
            decode(CONTEXT, check_status(CONTEXT, response)?).await?;
        Ok(entries.map(|entries| entries.into_iter().map(|entry| entry.id).collect()))
    }
}
