pub mod capture;
pub mod config;
pub mod driver;
pub mod error;
pub mod output;
pub mod session;

pub use harcap_common::error::DriverError;
pub use harcap_common::event;
pub use harcap_common::har;
pub use harcap_common::headers;
