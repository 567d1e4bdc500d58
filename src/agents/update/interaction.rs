use crate::error::{PatchError, Result};
use colored::Colorize;
use std::io::{self, BufRead, Write};

/// Answer to a single confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Yes,
    No,
    All,
    Quit,
}

impl Decision {
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "" | "y" | "yes" => Some(Decision::Yes),
            "n" | "no" => Some(Decision::No),
            "a" | "all" => Some(Decision::All),
            "q" | "quit" => Some(Decision::Quit),
            _ => None,
        }
    }
}

/// Manages user interaction for update operations
///
/// Keeps prompting out of the patch loop: the updater asks, this decides.
pub struct UpdateInteraction {
    enabled: bool,
    apply_all: bool,
}

impl UpdateInteraction {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            apply_all: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Confirm replacing revision `old` of master `name` with `new`.
    pub fn confirm_template(&mut self, name: &str, old: &str, new: &str) -> Result<bool> {
        if !self.enabled {
            return Ok(true);
        }

        println!(
            "\n{} {} {} {} to {}",
            "[Master]".cyan().bold(),
            name.white().bold(),
            "from".dimmed(),
            old.red(),
            new.green().bold()
        );

        if self.apply_all {
            println!("{}", "Auto-applying (previously selected 'all').".dimmed());
            return Ok(true);
        }

        let stdin = io::stdin();
        self.prompt(&mut stdin.lock())
    }

    fn prompt(&mut self, input: &mut impl BufRead) -> Result<bool> {
        loop {
            print!("{}", "Apply this update? [Y/n/a/q]: ".bold());
            io::stdout().flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Err(PatchError::UserCancelled);
            }

            match Decision::parse(&line) {
                Some(Decision::Yes) => return Ok(true),
                Some(Decision::No) => {
                    println!("{}", "Skipping this master.".dimmed());
                    return Ok(false);
                }
                Some(Decision::All) => {
                    println!(
                        "{}",
                        "Applying this and all remaining updates.".green().bold()
                    );
                    self.apply_all = true;
                    return Ok(true);
                }
                Some(Decision::Quit) => {
                    println!("{}", "Stopping update process at user request.".yellow());
                    return Err(PatchError::UserCancelled);
                }
                None => {
                    println!(
                        "{}",
                        "Please answer with y(es), n(o), a(ll), or q(quit).".red()
                    );
                }
            }
        }
    }
}
