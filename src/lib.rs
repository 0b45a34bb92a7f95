pub mod config;
pub mod domain;
pub mod error;
pub mod output;
pub mod ranking;
pub mod repository;
pub mod service;
