//! Small utilities shared by every crate in the workspace: logging setup, a hierarchical `Timer`,
//! and reading/writing JSON files.

#[macro_use]
extern crate log;

pub use crate::io::{file_exists, read_json, write_json};
pub use crate::time::Timer;

mod io;
pub mod logger;
mod time;

// Thanks https://stackoverflow.com/a/49806368
#[macro_export]
macro_rules! skip_fail {
    ($res:expr) => {
        match $res {
            Some(val) => val,
            None => {
                continue;
            }
        }
    };
}
