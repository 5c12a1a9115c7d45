pub mod chat;
pub mod identity;
pub mod project;
pub mod proposal;
pub mod quote;
pub mod tool;
