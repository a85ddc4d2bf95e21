//! Infrastructure layer - adapters for the workflow engine, mailbox providers and storage

pub mod cache;
pub mod content;
pub mod credentials;
pub mod engine;
pub mod integration;
pub mod logging;
pub mod observability;
pub mod services;
pub mod storage;
pub mod tenant;
pub mod workflow;
