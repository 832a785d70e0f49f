pub mod cdp;
pub mod driver;
mod events;

pub use cdp::LaunchOptions;
pub use driver::HeadlessDriver;
