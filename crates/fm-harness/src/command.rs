// crates/fm-harness/src/command.rs
// ============================================================================
// Module: Remote Commands
// Description: Immutable command representation with optional prompt responses.
// Purpose: Give executors one rendering of argv and raw shell commands.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`RemoteCommand`] is either an ordered argument vector or an opaque shell
//! string, plus an ordered map of expected interactive prompts to canned
//! responses. Commands are immutable once built; builder methods consume and
//! return `self`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// SECTION: Prompt Responses
// ============================================================================

/// Mapping of prompt text to the response fed when the prompt appears.
///
/// # Invariants
/// - Prompt keys are non-empty.
/// - Responses are sent followed by a newline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptResponses {
    /// Prompt text mapped to canned responses.
    entries: BTreeMap<String, String>,
}

impl PromptResponses {
    /// Creates an empty response map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Adds a prompt/response pair, replacing an existing entry for the prompt.
    ///
    /// Empty prompts are ignored because they would match any output.
    #[must_use]
    pub fn with(mut self, prompt: impl Into<String>, response: impl Into<String>) -> Self {
        let prompt = prompt.into();
        if !prompt.is_empty() {
            self.entries.insert(prompt, response.into());
        }
        self
    }

    /// Returns true when no prompts are expected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the response registered for an exact prompt.
    #[must_use]
    pub fn get(&self, prompt: &str) -> Option<&str> {
        self.entries.get(prompt).map(String::as_str)
    }

    /// Iterates prompts in key order.
    pub fn prompts(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Finds the earliest prompt occurring in `output`.
    ///
    /// Returns the prompt, its response, and the byte offset just past the
    /// match. Ties at the same offset prefer the longest prompt.
    #[must_use]
    pub fn find_in<'a>(&'a self, output: &str) -> Option<(&'a str, &'a str, usize)> {
        self.entries
            .iter()
            .filter_map(|(prompt, response)| {
                output.find(prompt.as_str()).map(|start| (start, prompt, response))
            })
            .min_by(|(a_start, a_prompt, _), (b_start, b_prompt, _)| {
                a_start.cmp(b_start).then_with(|| b_prompt.len().cmp(&a_prompt.len()))
            })
            .map(|(start, prompt, response)| {
                (prompt.as_str(), response.as_str(), start + prompt.len())
            })
    }
}

// ============================================================================
// SECTION: Command Line
// ============================================================================

/// Command line form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Ordered argument vector; each element is quoted on rendering.
    Argv(Vec<String>),
    /// Opaque shell text passed through unchanged.
    Shell(String),
}

/// Command ready for execution on a managed host.
///
/// # Invariants
/// - `Argv` commands always carry at least the program name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    /// Command line form.
    line: CommandLine,
    /// Expected prompts mapped to canned responses.
    responses: PromptResponses,
}

impl RemoteCommand {
    /// Builds an argv command from a program and its arguments.
    #[must_use]
    pub fn argv<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = vec![program.into()];
        argv.extend(args.into_iter().map(Into::into));
        Self {
            line: CommandLine::Argv(argv),
            responses: PromptResponses::new(),
        }
    }

    /// Builds an opaque shell command.
    #[must_use]
    pub fn shell(text: impl Into<String>) -> Self {
        Self {
            line: CommandLine::Shell(text.into()),
            responses: PromptResponses::new(),
        }
    }

    /// Adds an expected prompt with its canned response.
    #[must_use]
    pub fn with_response(mut self, prompt: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses = self.responses.with(prompt, response);
        self
    }

    /// Replaces the prompt response map.
    #[must_use]
    pub fn with_responses(mut self, responses: PromptResponses) -> Self {
        self.responses = responses;
        self
    }

    /// Returns the command line form.
    #[must_use]
    pub const fn line(&self) -> &CommandLine {
        &self.line
    }

    /// Returns the expected prompts.
    #[must_use]
    pub const fn responses(&self) -> &PromptResponses {
        &self.responses
    }

    /// Returns true when the command expects interactive prompts.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        !self.responses.is_empty()
    }

    /// Renders the command as POSIX shell text.
    #[must_use]
    pub fn render(&self) -> String {
        match &self.line {
            CommandLine::Argv(argv) => {
                argv.iter().map(|arg| shell_quote(arg)).collect::<Vec<_>>().join(" ")
            }
            CommandLine::Shell(text) => text.clone(),
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// ============================================================================
// SECTION: Quoting
// ============================================================================

/// Quotes a single word for POSIX `sh`.
///
/// Words made only of safe characters are returned unchanged; everything else
/// is wrapped in single quotes with embedded quotes spelled `'\''`.
#[must_use]
pub fn shell_quote(word: &str) -> String {
    if !word.is_empty() && word.bytes().all(is_safe_byte) {
        return word.to_string();
    }
    let mut out = String::with_capacity(word.len() + 2);
    out.push('\'');
    for ch in word.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Returns true for bytes that never need quoting.
const fn is_safe_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(byte, b'-' | b'_' | b'.' | b'/' | b':' | b'=' | b',' | b'@' | b'+' | b'%')
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
