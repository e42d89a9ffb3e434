pub mod broker;
pub mod config;
pub mod consumer;
pub mod dead_letter;
pub mod dispatch;
pub mod error;
pub mod library;
pub mod metrics_consts;
pub mod offsets;
pub mod processor;
pub mod registry;
pub mod repository;
