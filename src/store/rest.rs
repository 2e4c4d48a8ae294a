//! REST adapter for a Firebase-style realtime tree.
//!
//! `GET {base}/.json` returns the whole tree, `PUT {base}/{path}.json` sets
//! one key. The subscription is a poll loop that forwards a snapshot only
//! when the tree differs from the last one delivered. A device that stops
//! writing leaves a stale `isAlive: true` behind; re-sending it would look
//! like a fresh heartbeat.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{paths, TelemetryStore, FEED_CAPACITY};
use crate::error::StoreError;
use crate::models::RawSnapshot;
use crate::settings::Settings;

// ---

#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    auth: Option<String>,
    poll_interval: Duration,
}

impl RestStore {
    pub fn new(
        base_url: &str,
        auth: Option<String>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        // ---
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            poll_interval,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        // ---
        let builder = self.client.request(method, self.url(path));
        match &self.auth {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }

    async fn fetch(&self, path: &str) -> Result<Value, StoreError> {
        // ---
        let response = self.request(Method::GET, path).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    async fn fetch_root(&self) -> Result<Option<RawSnapshot>, StoreError> {
        // ---
        let body = self.fetch("").await?;
        if body.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(body)?))
    }

    async fn send_json(&self, method: Method, path: &str, body: &Value) -> Result<(), StoreError> {
        // ---
        let response = self.request(method, path).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn poll(self, tx: mpsc::Sender<RawSnapshot>, mut last: Option<RawSnapshot>) {
        // ---
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial fetch already happened.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = ticker.tick() => {}
            }

            match self.fetch_root().await {
                Ok(Some(snapshot)) => {
                    if last.as_ref() == Some(&snapshot) {
                        continue;
                    }
                    last = Some(snapshot.clone());
                    if tx.send(snapshot).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("store root is empty");
                    last = None;
                }
                Err(e) => warn!("snapshot poll failed: {}", e),
            }
        }

        debug!("snapshot feed closed, poll loop exiting");
    }
}

#[async_trait]
impl TelemetryStore for RestStore {
    async fn subscribe(&self) -> Result<mpsc::Receiver<RawSnapshot>, StoreError> {
        // ---
        let first = self.fetch_root().await?;
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);

        if let Some(snapshot) = &first {
            // Fresh channel with spare capacity.
            let _ = tx.try_send(snapshot.clone());
        }

        tokio::spawn(self.clone().poll(tx, first));
        debug!(url = %self.url(""), every_ms = self.poll_interval.as_millis() as u64, "subscribed");
        Ok(rx)
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        // ---
        debug!(path, %value, "PUT");
        self.send_json(Method::PUT, path, &value).await
    }

    async fn read_settings(&self) -> Result<Settings, StoreError> {
        // ---
        let body = self.fetch(paths::SETTINGS).await?;
        if body.is_null() {
            return Ok(Settings::default());
        }
        Ok(serde_json::from_value(body)?)
    }

    async fn seed(&self, snapshot: &RawSnapshot) -> Result<(), StoreError> {
        // ---
        let body = serde_json::to_value(snapshot)?;
        debug!(%body, "PATCH root");
        self.send_json(Method::PATCH, "", &body).await
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn store(base: &str) -> RestStore {
        RestStore::new(base, None, Duration::from_secs(2), Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_url_building() {
        // ---
        let s = store("https://unit-42.example.com/");
        assert_eq!(s.url(""), "https://unit-42.example.com/.json");
        assert_eq!(s.url("dry-fan"), "https://unit-42.example.com/dry-fan.json");
        assert_eq!(s.url("/settings/"), "https://unit-42.example.com/settings.json");
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_subscribe() {
        // ---
        // Port 9 (discard) on loopback is not expected to speak HTTP.
        let s = RestStore::new(
            "http://127.0.0.1:9",
            None,
            Duration::from_secs(2),
            Duration::from_millis(500),
        )
        .unwrap();
        assert!(s.subscribe().await.is_err());
    }
}
