pub mod config;
pub mod errors;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod server;
pub mod session;
pub mod store;
