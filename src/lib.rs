pub mod classifier;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod views;
