use console::{style, Term};
use std::fmt::Display;

/// Prints a green check mark followed by `message` on stdout.
pub fn success(message: &str) {
    let prefix = style("✔".to_string()).green();
    write_line(&Term::stdout(), &format!("{} {}", prefix, message));
}

/// Prints a red cross followed by the error on stderr.
pub fn failure(err: &dyn Display) {
    let prefix = style("✘".to_string()).red();
    write_line(&Term::stderr(), &format!("{} {}", prefix, err));
}

fn write_line(term: &Term, line: &str) {
    let _ = term.write_line(line);
}
