// Library exports for integration tests

pub mod diagnostics;
pub mod documents;
pub mod parser;
pub mod server;
pub mod taint;
