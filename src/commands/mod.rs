pub mod command;
pub mod handler;

pub use command::WatchCommand;
pub use handler::{CommandContext, CommandHandler};
