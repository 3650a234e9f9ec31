pub mod cli;
pub mod console;
pub mod controller;

pub use console::Console;
pub use controller::{GameOutcome, SessionController, write_stats};
