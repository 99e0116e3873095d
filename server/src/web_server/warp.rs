use prometheus::{Encoder, TextEncoder};
use tracing::{debug, error, info, trace};
use warp::{http::Uri, ws::WebSocket, Filter};
use warp_prometheus::Metrics;

use hannibal::{Actor, Context, Handler, Service};

use std::net::SocketAddr;

use crate::config::StorageConfig;
use crate::metrics::MetricsService;
use crate::upload;

/// Recordings can be big; the transport is the only place a limit exists.
const MAX_UPLOAD_BYTES: u64 = 512 * 1024 * 1024;

pub async fn peer_connected(ws: WebSocket) {
    debug!("peer connected {:#?}", ws);
    let connection = crate::connection::Connection::new(ws);
    match hannibal::Actor::start(connection).await {
        Ok(addr) => addr.wait_for_stop().await,
        Err(err) => error!("failed to start connection actor {}", err),
    }
}

#[derive(Default)]
pub struct WebServer;

#[async_trait::async_trait]
impl Actor for WebServer {
    const NAME: &'static str = module_path!();

    async fn started(&mut self, _ctx: &mut hannibal::Context<Self>) -> hannibal::Result<()> {
        info!("started web server");
        Ok(())
    }

    async fn stopped(&mut self, _ctx: &mut hannibal::Context<Self>) {
        info!("shutting down web server");
    }
}

impl Service for WebServer {}

#[async_trait::async_trait]
impl Handler<super::Listen> for WebServer {
    async fn handle(&mut self, _ctx: &mut Context<Self>, msg: super::Listen) {
        if let Err(error) = self.start(msg.socket, msg.storage).await {
            error!("{}", error);
        }
    }
}

impl WebServer {
    #[tracing::instrument(level = "info", skip_all, name = "warp_server")]
    async fn start(&mut self, addr: SocketAddr, storage: StorageConfig) -> hannibal::Result<()> {
        let registry = MetricsService::get_registry().await?;
        let path_labels = ["app", "ws", "upload", "files", "uploads", "metrics"];

        let metrics = Metrics::new(&registry, &path_labels.into_iter().map(Into::into).collect());

        let upload_dir = storage.upload_dir.clone();
        let with_upload_dir = warp::any().map(move || upload_dir.clone());

        let routes = {
            let ws_route = warp::path("ws")
                .and(warp::ws())
                .map(|ws: warp::ws::Ws| ws.on_upgrade(peer_connected));

            let app_route = warp::path("app").and(warp::fs::dir(storage.static_dir.clone()));

            let upload_route = warp::path("upload")
                .and(warp::post())
                .and(warp::query::<upload::UploadQuery>())
                .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
                .and(with_upload_dir.clone())
                .and_then(upload::handle_upload);

            let files_route = warp::path("files")
                .and(warp::get())
                .and(warp::query::<upload::FilesQuery>())
                .and(with_upload_dir)
                .and_then(upload::handle_list_files);

            let recordings_route = warp::path("uploads").and(warp::fs::dir(storage.upload_dir.clone()));

            let metrics_route = warp::path("metrics").map(move || {
                let mut buffer = vec![];
                let encoder = TextEncoder::new();
                let metric_families = registry.gather();
                if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
                    error!("cannot encode metrics {}", err);
                }
                let out: String = String::from_utf8_lossy(&buffer).into();
                out
            });

            let redirect_to_app = warp::any().map(|| {
                trace!("redirecting");
                warp::redirect(Uri::from_static("/app/"))
            });

            app_route
                .or(ws_route)
                .or(upload_route)
                .or(files_route)
                .or(recordings_route)
                .or(metrics_route)
                .or(redirect_to_app)
        };

        info!("serving app from {}", storage.static_dir.display());
        info!("serving recordings from {}", storage.upload_dir.display());
        debug!("checking {} for availability", addr);

        let dummy_listener = std::net::TcpListener::bind(addr);
        match dummy_listener {
            Err(error) => error!("cannot bind {} because {}", addr, error),
            Ok(dummy_listener) => {
                std::mem::drop(dummy_listener);
                warp::serve(
                    routes
                        .with(warp::log::custom(|info| {
                            trace!(
                                "{} {} {} {:?}",
                                info.method(),
                                info.path(),
                                info.status(),
                                info.remote_addr()
                            )
                        }))
                        .with(warp::log::custom(move |log| metrics.http_metrics(log))),
                )
                .run(addr)
                .await;
            }
        }
        info!("web server has terminated");
        Ok(())
    }
}
