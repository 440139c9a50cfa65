//! Request handlers for the API gateway

pub mod analyses;
pub mod conversations;
pub mod documents;
pub mod health;
