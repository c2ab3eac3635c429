pub mod domain;
pub mod error;
pub mod lifecycle;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
