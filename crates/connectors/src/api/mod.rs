pub mod decode;
pub mod fetcher;
