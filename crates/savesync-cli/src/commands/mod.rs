pub mod config;
pub mod link;
pub mod list;
pub mod status;
pub mod transfer;

use std::io::{BufRead, Write};

use anyhow::Result;

/// Asks a yes/no question on the terminal; anything but `y`/`yes` is no
pub fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(parse_yes(&answer))
}

fn parse_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
