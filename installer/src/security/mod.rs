pub mod cipher;
pub mod crypto;
