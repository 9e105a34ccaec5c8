use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use fns_logview::configuration::config::AppConfig;
use fns_logview::log_store::database::LogDatabase;
use fns_logview::web_interface::web_server::WebServer;

#[derive(Parser)]
#[command(name = "fns-logview")]
#[command(version = "0.1.0")]
#[command(about = "Web viewer for firewall flow-event syslog records")]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "0.0.0.0")]
    bind_address: String,

    /// Port for the HTTP server
    #[arg(long, default_value_t = 5000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    info!("Importing configuration");
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db = match LogDatabase::connect(&config.db).await {
        Ok(db) => db,
        Err(e) => {
            error!("Unable to connect to the log store: {}", e);
            std::process::exit(1);
        }
    };
    info!("Connected to the log store");

    let server = WebServer::new(Arc::new(db), Arc::new(config));
    if let Err(e) = server.start(&args.bind_address, args.port).await {
        error!("Web server error: {}, exiting...", e);
        std::process::exit(1);
    }
}
