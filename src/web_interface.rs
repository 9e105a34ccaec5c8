// Web Interface module root
pub mod routes;
pub mod web_server;

pub use web_server::WebServer;
