pub mod client;
pub mod registry;
pub mod row;
pub mod sync;
pub mod title;
