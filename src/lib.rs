pub mod configuration;
pub mod errors;
pub mod forms;
pub mod helpers;
pub mod models;
pub mod routes;
pub mod services;
pub mod startup;
pub mod telemetry;
