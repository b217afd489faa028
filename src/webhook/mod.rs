pub mod receiver;
pub mod signature;
