pub mod config;
pub mod domain;
pub mod repository;
pub mod telemetry;
pub mod usecase;
