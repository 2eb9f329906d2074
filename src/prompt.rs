// ABOUTME: Interactive input behind a trait so the core never touches the console directly.
// ABOUTME: The console implementation reads lines from stdin and secrets via rpassword.

use std::io::{self, BufRead, Write};

/// Source of interactive answers: plain lines, secrets, and menu choices.
pub trait Prompt: Send + Sync {
    /// Ask for a line of visible input. Returns the trimmed answer.
    fn read_line(&self, prompt: &str) -> io::Result<String>;

    /// Ask for a secret with echo suppressed.
    fn read_secret(&self, prompt: &str) -> io::Result<String>;

    /// Tell the user something without expecting an answer.
    fn notify(&self, message: &str);

    /// Ask until a non-empty line is given.
    fn read_required(&self, prompt: &str) -> io::Result<String> {
        loop {
            let answer = self.read_line(prompt)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
        }
    }

    /// Offer numbered choices and return the zero-based index picked.
    fn choose(&self, header: &str, items: &[String]) -> io::Result<usize> {
        if items.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "nothing to choose"));
        }
        let mut menu = String::from(header);
        for (i, item) in items.iter().enumerate() {
            menu.push_str(&format!("\n{}: {}", i + 1, item));
        }
        self.notify(&menu);
        loop {
            let answer = self.read_line("number > ")?;
            match answer.parse::<usize>() {
                Ok(n) if (1..=items.len()).contains(&n) => return Ok(n - 1),
                Ok(_) => self.notify("out of range"),
                Err(_) => {}
            }
        }
    }
}

/// Prompt backed by the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompt;

impl Prompt for ConsolePrompt {
    fn read_line(&self, prompt: &str) -> io::Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{prompt}")?;
        stderr.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed",
            ));
        }
        Ok(line.trim().to_string())
    }

    fn read_secret(&self, prompt: &str) -> io::Result<String> {
        rpassword::prompt_password(prompt)
    }

    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}
