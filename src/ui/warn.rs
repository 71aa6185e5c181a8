use std::io::{BufRead, Write};

/// Print a standardized warning line to stderr (color-aware).
pub fn warn_print(msg: &str) {
    let use_err = crate::color_enabled_stderr();
    eprintln!(
        "{}",
        crate::paint(use_err, "\x1b[33;1m", &format!("warning: {}", msg))
    );
}

/// True for an affirmative answer: `y` or `yes`, any case, surrounding whitespace ignored.
pub fn is_affirmative(answer: &str) -> bool {
    let a = answer.trim().to_ascii_lowercase();
    a == "y" || a == "yes"
}

/// Print `question` with a `[y/N]` suffix and read one line from `input`.
/// EOF or a read error counts as "no".
pub fn confirm_from<R: BufRead>(question: &str, input: &mut R) -> bool {
    let use_err = crate::color_enabled_stderr();
    eprint!("{}", crate::paint(use_err, "\x1b[33m", &format!("{question} [y/N] ")));
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => {
            eprintln!();
            false
        }
        Ok(_) => is_affirmative(&line),
    }
}

/// Interactive confirmation on stdin; refuses without asking when stdin is not a terminal.
pub fn confirm_on_stdin(question: &str) -> bool {
    if !atty::is(atty::Stream::Stdin) {
        warn_print("cannot ask for confirmation on non-interactive stdin; re-run with --force.");
        return false;
    }
    let stdin = std::io::stdin();
    let mut lock = stdin.lock();
    confirm_from(question, &mut lock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affirmative_answers() {
        for a in ["y", "Y", "yes", "YES", " Yes \n"] {
            assert!(is_affirmative(a), "{a:?} should be affirmative");
        }
        for a in ["", "n", "no", "yep", "sure"] {
            assert!(!is_affirmative(a), "{a:?} should not be affirmative");
        }
    }

    #[test]
    fn test_confirm_from_reader() {
        let mut yes = std::io::Cursor::new(b"yes\n".to_vec());
        assert!(confirm_from("Overwrite?", &mut yes));
        let mut no = std::io::Cursor::new(b"n\n".to_vec());
        assert!(!confirm_from("Overwrite?", &mut no));
        let mut eof = std::io::Cursor::new(Vec::new());
        assert!(!confirm_from("Overwrite?", &mut eof));
    }
}
