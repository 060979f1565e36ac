//! Image identifier extraction from build output.
//!
//! The build collaborator's contract: the last non-empty line of its standard
//! output ends with the identifier of the image it produced, e.g.
//!
//! ```text
//! Step 2/2 : CMD ["./app"]
//! Successfully built abc123
//! ```

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildOutputError {
    #[error("build produced no output")]
    Empty,

    #[error("last build output line `{line}` does not end with an image id")]
    Malformed { line: String },
}

/// A validated image reference (`abc123`, `sha256:…`, `app:dev`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageId(String);

impl ImageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse the image identifier out of captured build output.
pub fn parse_image_id(output: &str) -> Result<ImageId, BuildOutputError> {
    let line = output
        .lines()
        .rev()
        .map(|line| strip_ansi(line).trim().to_string())
        .find(|line| !line.is_empty())
        .ok_or(BuildOutputError::Empty)?;

    let token = line.split_whitespace().last().unwrap_or_default();
    if !image_ref_pattern().is_match(token) {
        return Err(BuildOutputError::Malformed { line });
    }
    Ok(ImageId(token.to_string()))
}

fn image_ref_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:/@-]*$").unwrap())
}

/// Strip ANSI escape codes from string.
fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    re.replace_all(s, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_builder_output() {
        let output = "Step 1/2 : FROM golang\nStep 2/2 : CMD [\"./app\"]\nSuccessfully built abc123\n";
        assert_eq!(parse_image_id(output).unwrap().as_str(), "abc123");
    }

    #[test]
    fn test_step_ellipsis_output() {
        let output = "Step 1/2...\nSuccessfully built abc123\n";
        assert_eq!(parse_image_id(output).unwrap().as_str(), "abc123");
    }

    #[test]
    fn test_trailing_blank_lines_skipped() {
        let output = "Successfully built 9f8e7d\n\n   \n";
        assert_eq!(parse_image_id(output).unwrap().as_str(), "9f8e7d");
    }

    #[test]
    fn test_quiet_build_digest() {
        let output = "sha256:4b825dc642cb6eb9a060e54bf8d69288fbee4904\n";
        assert_eq!(
            parse_image_id(output).unwrap().as_str(),
            "sha256:4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
    }

    #[test]
    fn test_colored_output() {
        let output = "\x1b[32mSuccessfully built abc123\x1b[0m\n";
        assert_eq!(parse_image_id(output).unwrap().as_str(), "abc123");
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(parse_image_id(""), Err(BuildOutputError::Empty));
        assert_eq!(parse_image_id("\n\n  \n"), Err(BuildOutputError::Empty));
    }

    #[test]
    fn test_malformed_last_token() {
        let err = parse_image_id("Step 3/3 : RUN make\nerror: (exit 2)\n").unwrap_err();
        assert_eq!(
            err,
            BuildOutputError::Malformed {
                line: "error: (exit 2)".to_string()
            }
        );
    }
}
