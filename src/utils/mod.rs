pub mod crypto;
pub mod file;
