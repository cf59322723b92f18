use crate::status_bridge::model::StatusView;
use doorcore::notify::NotificationLink;
use doorcore::orchestrator::{Command, OrchestratorHandle};
use log::{info, warn};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use warp::{http::StatusCode, Filter, Rejection, Reply};

/// Read path and command surface for a presentation layer.
///
/// The bridge never touches loop status itself; commands go through the
/// orchestrator queue like any other event.
#[derive(Clone)]
pub struct StatusBridge {
    handle: OrchestratorHandle,
    link: Arc<NotificationLink>,
}

impl StatusBridge {
    pub fn new(handle: OrchestratorHandle, link: Arc<NotificationLink>) -> Self {
        Self { handle, link }
    }

    pub fn view(&self) -> StatusView {
        StatusView {
            status: self.handle.status(),
            schedule: self.handle.schedule(),
            connectivity: self.link.status(),
            metrics: self.handle.metrics(),
        }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let bridge = self.clone();
        let bridge_filter = warp::any().map(move || bridge.clone());

        let status_route = warp::path("status")
            .and(warp::path::end())
            .and(warp::get())
            .and(bridge_filter.clone())
            .map(|bridge: StatusBridge| warp::reply::json(&bridge.view()));

        let command_route = warp::post()
            .and(
                warp::path!("start")
                    .map(|| Command::Start)
                    .or(warp::path!("stop").map(|| Command::Stop))
                    .unify()
                    .or(warp::path!("reset").map(|| Command::Reset))
                    .unify()
                    .or(warp::path!("counter" / "reset").map(|| Command::ResetCounter))
                    .unify()
                    .or(warp::path!("probe").map(|| Command::Probe))
                    .unify()
                    .or(warp::path!("model" / "reload").map(|| Command::ReloadModel))
                    .unify(),
            )
            .and(bridge_filter)
            .map(|command: Command, bridge: StatusBridge| {
                match bridge.handle.send(command) {
                    Ok(()) => warp::reply::with_status(
                        warp::reply::json(&json!({"status": "accepted", "command": format!("{:?}", command)})),
                        StatusCode::ACCEPTED,
                    ),
                    Err(err) => {
                        warn!("bridge command {:?} dropped: {}", command, err);
                        warp::reply::with_status(
                            warp::reply::json(&json!({"status": "error", "message": err.to_string()})),
                            StatusCode::SERVICE_UNAVAILABLE,
                        )
                    }
                }
            });

        status_route.or(command_route)
    }

    /// Serves the bridge until the runtime shuts down.
    pub async fn serve(self, addr: SocketAddr) {
        info!("status bridge listening on http://{}", addr);
        warp::serve(self.routes()).run(addr).await;
    }
}
