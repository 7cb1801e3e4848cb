//! Interactive tiddler editing
//!
//! The editor sees the whole tiddler in the store's text format, so tags,
//! type and fields are edited together with the body.

use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::process::Command;

use anyhow::{bail, Context, Result};

use gitstore_core::{Serializer, TextSerializer, Tiddler};

const FALLBACK_EDITOR: &str = "vi";

/// Edited tiddler on a terminal, otherwise `seed` with its body read from stdin
pub fn read_tiddler(seed: &Tiddler) -> Result<Tiddler> {
    if atty::is(atty::Stream::Stdin) {
        return edit_tiddler_with(&editor_command(), seed);
    }

    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read tiddler text from stdin")?;
    let mut tiddler = seed.clone();
    tiddler.set_text(text);
    Ok(tiddler)
}

/// $VISUAL, then $EDITOR, then vi
fn editor_command() -> String {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|editor| !editor.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_EDITOR.to_string())
}

/// Round-trip `seed` through `editor` as a `.tid` file
///
/// `editor` may carry arguments (`code --wait`); the file path is appended.
fn edit_tiddler_with(editor: &str, seed: &Tiddler) -> Result<Tiddler> {
    let mut words = editor.split_whitespace();
    let program = match words.next() {
        Some(program) => program,
        None => bail!("Editor command is empty. Set $EDITOR, or pass --text."),
    };

    let initial = TextSerializer
        .to_text(seed)
        .context("Failed to render tiddler for editing")?;
    let mut file = tempfile::Builder::new()
        .prefix("gitstore-")
        .suffix(".tid")
        .tempfile()
        .context("Failed to create temp file for editing")?;
    file.write_all(initial.as_bytes())
        .context("Failed to write temp file for editing")?;
    file.flush()
        .context("Failed to write temp file for editing")?;

    let status = Command::new(program)
        .args(words)
        .arg(file.path())
        .status()
        .with_context(|| format!("Failed to run editor: {}", editor))?;
    if !status.success() {
        bail!(
            "Editor '{}' exited with {}. Nothing was saved.",
            editor,
            status
        );
    }

    let edited = fs::read_to_string(file.path()).context("Failed to read edited tiddler")?;
    TextSerializer
        .from_text(&seed.title, &seed.bag, &edited)
        .context("Edited tiddler is not in tiddler text format")
}

/// Ask a yes/no question; anything but y or yes is no
///
/// Without a terminal on stdin the answer is no.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Tiddler {
        let mut tiddler = Tiddler::new("Foo", "alpha");
        tiddler.set_text("lorem ipsum");
        tiddler.set_tags(vec!["foo".to_string(), "two words".to_string()]);
        tiddler.set_field("origin", "cli");
        tiddler
    }

    #[cfg(unix)]
    #[test]
    fn test_unchanged_edit_keeps_tiddler() {
        let original = seed();
        let edited = edit_tiddler_with("true", &original).unwrap();

        assert_eq!(edited.title, "Foo");
        assert_eq!(edited.bag, "alpha");
        assert_eq!(edited.text, "lorem ipsum");
        assert_eq!(edited.tags, vec!["foo", "two words"]);
        assert_eq!(edited.fields.get("origin").map(String::as_str), Some("cli"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_editor_can_change_header_and_body() {
        let edited = edit_tiddler_with("sed -i -e s/lorem/dolor/ -e s/origin:/source:/", &seed())
            .unwrap();

        assert_eq!(edited.text, "dolor ipsum");
        assert!(edited.fields.get("origin").is_none());
        assert_eq!(edited.fields.get("source").map(String::as_str), Some("cli"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_editor_aborts() {
        let result = edit_tiddler_with("false", &seed());
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_editor_command_is_rejected() {
        assert!(edit_tiddler_with("   ", &seed()).is_err());
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
    }
}
