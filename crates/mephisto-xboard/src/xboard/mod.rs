//! CECP (Xboard) protocol subset spoken with the GUI.

mod commands;
mod output;
mod parser;

pub use commands::{LevelParams, XboardCommand};
pub use output::{GuiWriter, OutputError, SharedBuffer, XboardResponse};
pub use parser::parse_xboard_command;
