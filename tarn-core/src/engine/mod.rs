//! Process orchestration: collaborator contracts and the main trading loop.

pub mod runner;

pub use runner::{Admin, Runner};
