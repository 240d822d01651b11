pub mod fs;
pub mod progress;
