//! Interactive directory selection.
//!
//! Asks for the input and output directories (offering the last saved pair
//! as defaults), has each one confirmed, checks the input exists and creates
//! the output if needed. Prompting goes through [`Prompter`] so the flow can
//! be driven by a script in tests.

use dialoguer::{Confirm, Input};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{ConvertError, Result};
use crate::settings::Settings;

/// Source of user answers
pub trait Prompter {
    /// Free-text answer; an empty answer yields `default`
    fn input(&mut self, prompt: &str, default: &str) -> Result<String>;

    /// Yes/no question defaulting to yes
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Prompts on the terminal using dialoguer
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str, default: &str) -> Result<String> {
        let mut input = Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true);
        if !default.is_empty() {
            input = input.default(default.to_string());
        }
        let answer = input
            .interact_text()
            .map_err(|e| ConvertError::prompt(e.to_string()))?;
        Ok(clean_path_input(&answer, default))
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()
            .map_err(|e| ConvertError::prompt(e.to_string()))
    }
}

/// Trim whitespace and the quotes Explorer's "Copy as path" adds
pub fn clean_path_input(answer: &str, default: &str) -> String {
    let cleaned = answer.trim().trim_matches('"').trim();
    if cleaned.is_empty() {
        default.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Ask for a directory until the user confirms it
fn ask_confirmed<P: Prompter>(
    prompter: &mut P,
    label: &str,
    first: Option<String>,
    default: &str,
) -> Result<String> {
    let mut answer = match first {
        Some(answer) => answer,
        None => prompter.input(label, default)?,
    };
    while !prompter.confirm(&format!("{} is {}, confirm?", label, answer))? {
        answer = prompter.input(label, default)?;
    }
    Ok(answer)
}

/// Create `dir` if it does not exist yet
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Err(ConvertError::OutputDirectory {
            path: dir.to_path_buf(),
            reason: "no output directory given".to_string(),
        });
    }
    if dir.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(dir).map_err(|e| ConvertError::OutputDirectory {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    println!("Created output directory {}", dir.display());
    info!("Created output directory {:?}", dir);
    Ok(())
}

/// Work out the directory pair for this run.
///
/// `cli_input` replaces the input prompt but is still confirmed. Fails when
/// the input directory does not exist or the output cannot be created.
pub fn choose_directories<P: Prompter>(
    prompter: &mut P,
    cli_input: Option<String>,
    last: &Settings,
) -> Result<Settings> {
    let input = ask_confirmed(
        prompter,
        "SLDPRT input directory",
        cli_input,
        &last.input_directory,
    )?;
    if input.is_empty() || !Path::new(&input).is_dir() {
        return Err(ConvertError::directory(format!("path {:?} does not exist", input)));
    }

    let output = ask_confirmed(prompter, "STL output directory", None, &last.output_directory)?;
    ensure_output_dir(Path::new(&output))?;

    Ok(Settings::new(input, output))
}
