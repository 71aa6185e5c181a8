//! Interactive prompts and warning output.

pub mod warn;

pub use warn::{confirm_from, confirm_on_stdin, is_affirmative, warn_print};
