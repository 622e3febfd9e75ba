//! Interactive Segmentation Inference Server Library

pub mod api;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod service;

pub use config::Config;
