pub mod client;
pub mod decoder;
#[cfg(test)]
pub mod mock;
pub mod types;
