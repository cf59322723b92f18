//! Best-effort delivery of door-state changes: one GET per call, no retry.

use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::interface::{DoorState, StateNotifier};
use crate::prelude::{EndpointConfig, NotifyError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityStatus {
    pub is_connected: bool,
    pub last_sent_state: Option<DoorState>,
    pub status_text: String,
}

impl Default for ConnectivityStatus {
    fn default() -> Self {
        Self {
            is_connected: false,
            last_sent_state: None,
            status_text: "Not connected".into(),
        }
    }
}

pub struct NotificationLink {
    client: reqwest::Client,
    endpoint: EndpointConfig,
    status: watch::Sender<ConnectivityStatus>,
}

impl NotificationLink {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: EndpointConfig) -> Self {
        let (status, _) = watch::channel(ConnectivityStatus::default());
        Self {
            client,
            endpoint,
            status,
        }
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status.subscribe()
    }

    /// Sends `state` and records the outcome.
    pub async fn send_state(&self, state: DoorState) -> Result<(), NotifyError> {
        let path = self
            .endpoint
            .path_for(state)
            .ok_or(NotifyError::UnsupportedState(state))?;
        let url = self.endpoint.url_for(path);
        info!("sending door state '{}' to {}", state, url);

        let outcome = self.get(&url).await;
        self.status.send_modify(|status| match &outcome {
            Ok(()) => {
                status.is_connected = true;
                status.last_sent_state = Some(state);
                status.status_text = format!("Connected - Last sent: {}", state);
            }
            Err(err) => {
                status.is_connected = false;
                status.status_text = failure_text(err);
            }
        });

        match &outcome {
            Ok(()) => info!("door state '{}' delivered", state),
            Err(err) => warn!("door state '{}' not delivered: {}", state, err),
        }
        outcome
    }

    /// Zero-payload probe of the endpoint root. Never touches `last_sent_state`.
    pub async fn test_connectivity(&self) -> Result<(), NotifyError> {
        let url = self.endpoint.url_for(&self.endpoint.probe_path);
        info!("probing {}", url);

        let outcome = self.get(&url).await;
        self.status.send_modify(|status| match &outcome {
            Ok(()) => {
                status.is_connected = true;
                status.status_text = "Connected to endpoint".into();
            }
            Err(err) => {
                status.is_connected = false;
                status.status_text = failure_text(err);
            }
        });

        if let Err(err) = &outcome {
            warn!("connectivity probe failed: {}", err);
        }
        outcome
    }

    /// Fire-and-forget variant of [`send_state`](Self::send_state).
    pub fn dispatch(self: &Arc<Self>, state: DoorState) -> JoinHandle<Result<(), NotifyError>> {
        let link = Arc::clone(self);
        tokio::spawn(async move { link.send_state(state).await })
    }

    async fn get(&self, url: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status(status.as_u16()))
        }
    }
}

fn failure_text(err: &NotifyError) -> String {
    match err {
        NotifyError::Status(code) => format!("HTTP error: {}", code),
        NotifyError::Transport(reason) => format!("Connection failed: {}", reason),
        NotifyError::UnsupportedState(state) => format!("No endpoint for state {}", state),
    }
}

#[async_trait]
impl StateNotifier for NotificationLink {
    async fn notify(&self, state: DoorState) -> Result<(), NotifyError> {
        self.send_state(state).await
    }

    async fn probe(&self) -> Result<(), NotifyError> {
        self.test_connectivity().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warp::http::StatusCode;
    use warp::Filter;

    struct Endpoint {
        addr: SocketAddr,
        hits: Arc<AtomicUsize>,
    }

    fn spawn_endpoint(open: StatusCode, closed: StatusCode, root: StatusCode) -> Endpoint {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let count = warp::any()
            .map(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .untuple_one();

        let open_route = warp::path("open")
            .and(warp::path::end())
            .map(move || warp::reply::with_status("door opened", open));
        let closed_route = warp::path("closed")
            .and(warp::path::end())
            .map(move || warp::reply::with_status("door closed", closed));
        let root_route = warp::path::end().map(move || warp::reply::with_status("ready", root));
        let routes = warp::get().and(count).and(open_route.or(closed_route).or(root_route));

        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        Endpoint { addr, hits }
    }

    fn link_for(addr: SocketAddr) -> NotificationLink {
        NotificationLink::new(EndpointConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            ..Default::default()
        })
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn successful_send_marks_connected() {
        let endpoint = spawn_endpoint(StatusCode::OK, StatusCode::OK, StatusCode::OK);
        let link = link_for(endpoint.addr);

        link.send_state(DoorState::Open).await.unwrap();

        let status = link.status();
        assert!(status.is_connected);
        assert_eq!(status.last_sent_state, Some(DoorState::Open));
        assert_eq!(status.status_text, "Connected - Last sent: open");
        assert_eq!(endpoint.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_error_keeps_previous_state() {
        let endpoint = spawn_endpoint(
            StatusCode::OK,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::OK,
        );
        let link = link_for(endpoint.addr);
        link.send_state(DoorState::Open).await.unwrap();

        let err = link.send_state(DoorState::Closed).await.unwrap_err();

        assert_eq!(err, NotifyError::Status(500));
        let status = link.status();
        assert!(!status.is_connected);
        assert_eq!(status.last_sent_state, Some(DoorState::Open));
        assert_eq!(status.status_text, "HTTP error: 500");
        assert_eq!(endpoint.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transport_failure_is_not_retried() {
        let link = NotificationLink::new(EndpointConfig {
            port: closed_port(),
            ..Default::default()
        });

        let err = link.send_state(DoorState::Closed).await.unwrap_err();

        assert!(matches!(err, NotifyError::Transport(_)));
        let status = link.status();
        assert!(!status.is_connected);
        assert_eq!(status.last_sent_state, None);
        assert!(status.status_text.starts_with("Connection failed"));
    }

    #[tokio::test]
    async fn probe_never_touches_last_sent_state() {
        let endpoint = spawn_endpoint(StatusCode::OK, StatusCode::OK, StatusCode::OK);
        let link = link_for(endpoint.addr);
        let mut updates = link.subscribe();

        link.test_connectivity().await.unwrap();

        assert!(updates.has_changed().unwrap());
        let status = updates.borrow_and_update().clone();
        assert!(status.is_connected);
        assert_eq!(status.last_sent_state, None);
        assert_eq!(status.status_text, "Connected to endpoint");
    }

    #[tokio::test]
    async fn failed_probe_disconnects() {
        let endpoint = spawn_endpoint(StatusCode::OK, StatusCode::OK, StatusCode::SERVICE_UNAVAILABLE);
        let link = link_for(endpoint.addr);
        link.send_state(DoorState::Closed).await.unwrap();

        assert_eq!(link.test_connectivity().await, Err(NotifyError::Status(503)));
        let status = link.status();
        assert!(!status.is_connected);
        assert_eq!(status.last_sent_state, Some(DoorState::Closed));
    }

    #[tokio::test]
    async fn unknown_state_is_rejected_without_a_request() {
        let endpoint = spawn_endpoint(StatusCode::OK, StatusCode::OK, StatusCode::OK);
        let link = link_for(endpoint.addr);

        let err = link.send_state(DoorState::Unknown).await.unwrap_err();

        assert_eq!(err, NotifyError::UnsupportedState(DoorState::Unknown));
        assert_eq!(link.status(), ConnectivityStatus::default());
        assert_eq!(endpoint.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dispatch_runs_in_background() {
        let endpoint = spawn_endpoint(StatusCode::OK, StatusCode::OK, StatusCode::OK);
        let link = Arc::new(link_for(endpoint.addr));

        let handle = link.dispatch(DoorState::Closed);
        handle.await.unwrap().unwrap();

        assert_eq!(link.status().last_sent_state, Some(DoorState::Closed));
    }
}
