pub mod cache;
pub mod classify;
pub mod dispatch;
pub mod jobs;
pub mod models;
