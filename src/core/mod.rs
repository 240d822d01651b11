pub mod repacker;
pub mod scanner;
pub mod transcoder;
