pub mod block;
pub mod block_identifier;
pub mod receipt;
pub mod transaction;
