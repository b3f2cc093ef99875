mod access_requests;
mod auth;
mod clients;
mod dashboard;
pub mod dto;
mod pages;
mod records;
pub mod response;
mod router;
mod users;
pub mod validation;

pub use router::{AppState, create_router};
