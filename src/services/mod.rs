pub mod command;

pub use command::CommandModel;
