use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::info;

use crate::configuration::config::AppConfig;
use crate::error_handling::types::WebError;
use crate::log_store::database::LogDatabase;
use crate::web_interface::routes;

use warp::Filter;

/// Web server for the viewer's HTTP API and dashboard.
///
/// Every route is read-only; the viewer never mutates the store, so it is
/// safe to run alongside the pruner without coordination.
pub struct WebServer {
    db: Arc<LogDatabase>,
    config: Arc<AppConfig>,
}

impl WebServer {
    /// Create a new WebServer instance
    pub fn new(db: Arc<LogDatabase>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// Start the web server on the given address and port
    pub async fn start(&self, bind_address: &str, port: u16) -> Result<(), WebError> {
        let ip: IpAddr = bind_address
            .parse()
            .map_err(|_| WebError::InvalidBindAddress(bind_address.to_string()))?;

        let api = routes::dashboard_route()
            .or(routes::logs_route(self.db.clone()))
            .or(routes::filter_options_route(self.db.clone()))
            .or(routes::analytics_route(self.db.clone()))
            .or(routes::statistics_route(self.db.clone(), self.config.clone()));

        let addr: SocketAddr = (ip, port).into();
        info!("Serving log viewer on http://{}", addr);

        warp::serve(api).run(addr).await;

        Ok(())
    }
}
