pub mod collect;
pub mod config;
pub mod defense;
pub mod features;
pub mod http_client;
pub mod logging;
pub mod merge;
pub mod model;
pub mod roster;
pub mod season;
pub mod shots;
pub mod stats_api;
pub mod table;
