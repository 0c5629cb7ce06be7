pub mod command;
pub mod logging;
pub mod parallel;

pub use logging::{init_logging, LogCapture};
pub use parallel::process_each;
