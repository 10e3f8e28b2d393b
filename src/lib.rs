pub mod app_list;
pub mod args;
pub mod config;
pub mod error;
pub mod game_files;
pub mod icon;
pub mod ledger;
pub mod process;
pub mod steam;
pub mod vdf;

pub use error::{Error, Result};
