pub mod locking;
pub mod store;
pub mod token_client;
