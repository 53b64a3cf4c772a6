pub mod config;
pub mod dao;
pub mod errors;
pub mod installation;
pub mod orchestrator;
pub mod primitives;
pub mod proposal;
pub mod sdk;
pub mod ui;
