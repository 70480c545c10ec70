use anyhow::{Context, Result};
use console::Term;

/// Source of answers for paths not given on the command line.
pub trait Prompter {
    fn intro(&mut self) -> Result<()> {
        Ok(())
    }

    /// `None` or a blank answer means "use the default".
    fn ask(&mut self, label: &str) -> Result<Option<String>>;

    fn outro(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Answers every question with the default.
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn ask(&mut self, _label: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

pub struct TermPrompter {
    term: Term,
}

impl TermPrompter {
    /// A prompter on stdout, or `None` when nobody is at the terminal.
    pub fn attended() -> Option<Self> {
        let term = Term::stdout();
        term.is_term().then_some(Self { term })
    }
}

impl Prompter for TermPrompter {
    fn intro(&mut self) -> Result<()> {
        let cwd = std::env::current_dir().context("cannot read current directory")?;
        self.term
            .write_line(&format!("Current working directory: {}\n", cwd.display()))?;
        self.term.write_line(
            "Please enter the path to the following (or leave empty for default):",
        )?;
        Ok(())
    }

    fn ask(&mut self, label: &str) -> Result<Option<String>> {
        self.term.write_str(&console::style(label).cyan().to_string())?;
        let answer = self.term.read_line().context("failed to read answer")?;
        Ok(Some(answer))
    }

    fn outro(&mut self) -> Result<()> {
        self.term.write_line("")?;
        Ok(())
    }
}
