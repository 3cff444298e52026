/// Result structs for command output. Commands return these instead of printing
/// directly; main.rs formats them as human-readable or JSON based on --json.
mod init;
mod install;

pub use init::*;
pub use install::*;
