//! Quote-aware scanning of shell command text.
//!
//! Structural checks (pipes, redirects, chaining) must not fire on operator
//! characters that only appear inside a quoted argument such as
//! `--filter='name~a|b'`. Everything here is a single left-to-right pass.
//! A backslash outside single quotes makes the next character literal, so
//! `\'` never opens a quoted span.

/// Shell operators that separate one command unit from the next.
const UNIT_SEPARATORS: &[char] = &[';', '|', '&', '\n'];

/// Where a character sits relative to quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    /// An opening or closing quote character.
    Delimiter,
    /// Inside a single- or double-quoted span.
    Quoted,
    /// Outside any quotes.
    Bare,
    /// Backslash-escaped character outside quotes; never an operator.
    Escaped,
}

/// Tracks single and double quote state independently.
#[derive(Debug, Default)]
struct QuoteState {
    single: bool,
    double: bool,
    escaped: bool,
}

impl QuoteState {
    fn classify(&mut self, c: char) -> Span {
        if self.escaped {
            self.escaped = false;
            return if self.double {
                Span::Quoted
            } else {
                Span::Escaped
            };
        }
        if c == '\\' && !self.single {
            self.escaped = true;
            return if self.double { Span::Quoted } else { Span::Bare };
        }
        if c == '\'' && !self.double {
            self.single = !self.single;
            return Span::Delimiter;
        }
        if c == '"' && !self.single {
            self.double = !self.double;
            return Span::Delimiter;
        }
        if self.single || self.double {
            Span::Quoted
        } else {
            Span::Bare
        }
    }
}

/// Return a copy of `command` with the contents of every quoted span
/// replaced by spaces. Quote characters themselves are kept.
///
/// ```
/// use warden::authz::scanner::strip_quoted;
/// assert_eq!(strip_quoted("a --f='x|y' | b"), "a --f='   ' | b");
/// ```
pub fn strip_quoted(command: &str) -> String {
    let mut state = QuoteState::default();
    command
        .chars()
        .map(|c| match state.classify(c) {
            Span::Quoted => ' ',
            Span::Delimiter | Span::Bare | Span::Escaped => c,
        })
        .collect()
}

/// Whether `command` contains a chain or pipe operator outside quotes.
pub fn has_unit_separator(command: &str) -> bool {
    !separator_offsets(command).is_empty()
}

/// Byte offsets of unit separators outside quotes. An `&` that belongs to a
/// redirection (`2>&1`, `&>file`, `<&0`) is not a separator.
fn separator_offsets(command: &str) -> Vec<usize> {
    let mut state = QuoteState::default();
    let mut offsets = Vec::new();
    let mut prev = None;
    let mut chars = command.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let next = chars.peek().map(|(_, n)| *n);
        let bare = state.classify(c) == Span::Bare;
        let redirect_amp =
            c == '&' && (matches!(prev, Some('>' | '<')) || next == Some('>'));
        if bare && UNIT_SEPARATORS.contains(&c) && !redirect_amp {
            offsets.push(idx);
        }
        prev = Some(c);
    }
    offsets
}

/// Split a compound command into its units at `&&`, `||`, `;`, `|`, `&`
/// and newlines that appear outside quotes.
///
/// Units are trimmed; empty units (e.g. from a trailing `;`) are dropped.
pub fn split_units(command: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0;

    for idx in separator_offsets(command) {
        push_unit(&mut units, &command[start..idx]);
        // Separators are single-byte ASCII, and a doubled operator
        // (`&&`, `||`) just yields an empty unit in between.
        start = idx.saturating_add(1);
    }
    push_unit(&mut units, &command[start..]);
    units
}

fn push_unit<'a>(units: &mut Vec<&'a str>, raw: &'a str) {
    let unit = raw.trim();
    if !unit.is_empty() {
        units.push(unit);
    }
}

/// Whether `command` runs a nested command the shell would expand outside
/// single quotes: `$(...)`, a backtick, or process substitution `<(...)` and
/// `>(...)`.
pub fn has_command_substitution(command: &str) -> bool {
    let mut state = QuoteState::default();
    let mut prev: Option<(char, Span)> = None;
    for c in command.chars() {
        let span = state.classify(c);
        let expandable = span == Span::Bare || (span == Span::Quoted && state.double);
        let opens_nested = c == '('
            && matches!(prev, Some(('$' | '<' | '>', Span::Bare | Span::Quoted)));
        if expandable && (c == '`' || opens_nested) {
            return true;
        }
        prev = Some((c, span));
    }
    false
}

/// Whether `command` redirects output into a file. Redirects to
/// `/dev/null` or to another descriptor (`2>&1`, `>&-`) are not writes.
pub fn has_file_redirect(command: &str) -> bool {
    let stripped = strip_quoted(command);
    let mut rest = stripped.as_str();
    while let Some(pos) = rest.find('>') {
        let target = rest[pos..].trim_start_matches('>').trim_start();
        let token = target.split_whitespace().next().unwrap_or("");
        if !(token == "/dev/null" || is_descriptor_target(token)) {
            return true;
        }
        rest = &rest[pos.saturating_add(1)..];
    }
    false
}

/// `&N` or `&-`. A bare `>& file` still writes `file`.
fn is_descriptor_target(token: &str) -> bool {
    match token.strip_prefix('&') {
        Some("-") => true,
        Some(fd) => !fd.is_empty() && fd.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}
