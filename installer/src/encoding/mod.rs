pub mod serialized;
pub mod transcode;
