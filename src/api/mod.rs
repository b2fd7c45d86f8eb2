//! HTTP front end over the processing pipelines

pub mod handlers;
pub mod models;
pub mod routes;

pub use routes::create_router;
