pub mod api_football;
pub mod config;
pub mod engine;
pub mod football_data;
pub mod http_client;
pub mod leagues;
pub mod matcher;
pub mod model;
pub mod provider;
pub mod store;
