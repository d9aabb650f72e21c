//! Prompt detection and command output parsing.

use exec_agent_core::CommandOutput;

/// Prompt shown by the configured shell. `\$` renders as `#` for root.
pub const PS1: &str = "[exec-agent] \\$ ";

/// Prints a blank line and the exit status of the previous command before
/// every prompt, so the status is always the last captured line.
pub const PROMPT_COMMAND: &str = "printf '\\n%s\\n' \"$?\"";

/// [`PS1`] as rendered for a regular user and for root.
const RENDERED_PROMPTS: [&[u8]; 2] = [b"[exec-agent] $ ", b"[exec-agent] # "];

/// Readline settings applied once the shell is up. Tabs in typed input are
/// inserted literally instead of triggering completion.
pub const READLINE_SETUP: &str =
    "bind 'set disable-completion on' 2>/dev/null; bind 'set enable-bracketed-paste off' 2>/dev/null";

/// Returns the offset where the prompt line starts if `buffer` currently
/// ends with the configured prompt.
///
/// Only the trailing unterminated line is considered, and it must end with
/// the full rendered [`PS1`], so output that merely ends in `$ ` does not
/// count as a prompt.
#[must_use]
pub fn prompt_start(buffer: &[u8]) -> Option<usize> {
    let line_start = buffer
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1);
    let tail = strip_ansi_escapes::strip(&buffer[line_start..]);
    RENDERED_PROMPTS
        .iter()
        .any(|prompt| tail.ends_with(prompt))
        .then_some(line_start)
}

/// Decode everything the shell printed before the prompt.
///
/// Returns `None` if the bytes are not valid UTF-8. Escape sequences are
/// only stripped when present since stripping also drops tabs.
#[must_use]
pub fn decode_output(raw: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(raw).ok()?;
    let text = if text.contains('\x1b') {
        strip_ansi_escapes::strip_str(text)
    } else {
        text.to_owned()
    };
    Some(text.replace("\r\n", "\n"))
}

/// Split captured text into output and exit status.
///
/// The first line is the echoed command and is dropped; the last remaining
/// line is the exit status printed by [`PROMPT_COMMAND`].
#[must_use]
pub fn parse_command_output(before_prompt: &str) -> CommandOutput {
    let body = before_prompt
        .trim()
        .split_once('\n')
        .map_or("", |(_, rest)| rest)
        .trim();
    match body.rsplit_once('\n') {
        Some((output, exit_code)) => CommandOutput::new(output.trim(), exit_code.trim()),
        None => CommandOutput::new("", body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_detected_on_trailing_line() {
        let buf = b"echo hi\r\nhi\r\n\r\n0\r\n[exec-agent] $ ";
        let start = prompt_start(buf).unwrap();
        assert_eq!(&buf[start..], b"[exec-agent] $ ");
        assert_eq!(prompt_start(b"out\r\n0\r\n[exec-agent] # "), Some(8));
    }

    #[test]
    fn test_output_ending_in_dollar_is_not_a_prompt() {
        assert_eq!(prompt_start(b"printf 'cost $ '\r\ncost $ "), None);
        assert_eq!(prompt_start(b"root # "), None);
    }

    #[test]
    fn test_rendered_prompts_match_ps1() {
        for sigil in ["$", "#"] {
            let rendered = PS1.replace("\\$", sigil);
            assert!(RENDERED_PROMPTS.contains(&rendered.as_bytes()));
        }
    }

    #[test]
    fn test_dollar_inside_complete_line_is_not_a_prompt() {
        assert_eq!(prompt_start(b"price: 5$ \r\nstill running"), None);
        assert_eq!(prompt_start(b"partial $"), None);
        assert_eq!(prompt_start(b""), None);
    }

    #[test]
    fn test_prompt_with_escape_sequences() {
        let buf = b"out\r\n\x1b[01;32m[exec-agent] $ \x1b[0m";
        // reset sequence after the prompt text
        assert_eq!(prompt_start(buf), Some(5));
    }

    #[test]
    fn test_parse_echo_output() {
        let text = decode_output(b"echo hi\r\nhi\r\n\r\n0\r\n").unwrap();
        assert_eq!(parse_command_output(&text), CommandOutput::new("hi", "0"));
    }

    #[test]
    fn test_parse_multiline_output_and_nonzero_status() {
        let text = "ls missing\n  a\n  b\n\n2\n";
        assert_eq!(parse_command_output(text), CommandOutput::new("a\n  b", "2"));
    }

    #[test]
    fn test_parse_command_without_output() {
        assert_eq!(
            parse_command_output("cd /tmp\n\n0\n"),
            CommandOutput::new("", "0")
        );
    }

    #[test]
    fn test_parse_output_without_trailing_newline() {
        // printf 'abc' leaves no newline; the blank line from PROMPT_COMMAND separates it
        assert_eq!(
            parse_command_output("printf 'abc'\nabc\n0\n"),
            CommandOutput::new("abc", "0")
        );
    }

    #[test]
    fn test_parse_missing_echo() {
        assert_eq!(parse_command_output("   "), CommandOutput::default());
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        assert!(decode_output(b"bad \xff\xfe bytes").is_none());
        assert_eq!(decode_output(b"\x1b[1mbold\x1b[0m\r\n").unwrap(), "bold\n");
    }
}
