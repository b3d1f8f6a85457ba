//! HTTP client used for weight downloads

mod client;

pub use client::{ByteStream, HttpClient, HttpClientTrait};

#[cfg(test)]
pub use client::mock;
