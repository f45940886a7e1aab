//! Interactive prompts on stdin.

use anyhow::Result;
use std::io::{self, Write};

/// Ask a yes/no question. `assume_yes` answers without prompting.
pub fn confirm(question: &str, default_yes: bool, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }

    let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
    let answer = ask(&format!("{} {}: ", question, hint))?.to_lowercase();
    Ok(match answer.as_str() {
        "" => default_yes,
        "y" | "yes" => true,
        _ => false,
    })
}

/// Print `prompt` and read one trimmed line.
pub fn ask(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

/// Parse a selection of 1-based indices: `all`, `none`, or a list such as
/// `1,3-4`. Returns 0-based indices in ascending order.
pub fn parse_selection(input: &str, count: usize) -> Result<Vec<usize>, String> {
    let input = input.trim().to_lowercase();
    match input.as_str() {
        "" | "all" | "a" => return Ok((0..count).collect()),
        "none" | "n" => return Ok(Vec::new()),
        _ => {}
    }

    let parse_index = |s: &str| -> Result<usize, String> {
        let n: usize = s
            .trim()
            .parse()
            .map_err(|_| format!("Not a number: {}", s.trim()))?;
        if n == 0 || n > count {
            return Err(format!("Out of range: {} (1-{})", n, count));
        }
        Ok(n - 1)
    };

    let mut selected = Vec::new();
    for part in input.split(',').filter(|p| !p.trim().is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse_index(start)?, parse_index(end)?);
                if start > end {
                    return Err(format!("Invalid range: {}", part.trim()));
                }
                selected.extend(start..=end);
            }
            None => selected.push(parse_index(part)?),
        }
    }

    selected.sort_unstable();
    selected.dedup();
    Ok(selected)
}
