pub mod config;
pub mod consumer;
pub mod domain;
pub mod infra;
pub mod processor;
pub mod processors;
