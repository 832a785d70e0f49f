pub mod error;
pub mod event;
pub mod har;
pub mod headers;
