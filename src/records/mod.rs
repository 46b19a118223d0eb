//! Practice records held in memory: the court directory, the document vault
//! and the blog board.

pub mod blog;
pub mod courts;
pub mod vault;
