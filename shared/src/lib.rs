pub mod config;
pub mod error;
pub mod event;
pub mod image;
pub mod naming;
pub mod pipeline;
pub mod response;
pub mod scratch;
pub mod storage;
