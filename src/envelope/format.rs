//! Human-readable rendering of an [`ErrorEnvelope`] against the failing query.

use super::error::ErrorEnvelope;

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Options for [`format_sql_error`].
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Draw a caret under the failing position.
    pub show_position: bool,
    /// Include the query text.
    pub show_query: bool,
    /// Use ANSI colors.
    pub color: bool,
    /// Truncate long queries to this many characters around the cursor.
    pub max_query_length: Option<usize>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            show_position: true,
            show_query: true,
            color: false,
            max_query_length: None,
        }
    }
}

/// Format an error report for `query`.
///
/// ```text
/// Error: Expected: an SQL statement, found: NOT at Line: 1, Column: 1
/// Position: 0
/// Source: function: parse
/// NOT A QUERY
/// ^
/// ```
pub fn format_sql_error(error: &ErrorEnvelope, query: &str, options: &FormatOptions) -> String {
    let (red, yellow, reset) = if options.color {
        (RED, YELLOW, RESET)
    } else {
        ("", "", "")
    };

    let mut lines = vec![format!("{red}Error: {}{reset}", error.message)];

    // cursor_position is 1-based; the report uses 0-based columns
    let position = error
        .has_position()
        .then(|| (error.cursor_position - 1) as usize);

    if let Some(position) = position {
        lines.push(format!("Position: {position}"));
    }

    let mut origin = Vec::new();
    if let Some(file) = &error.file_name {
        origin.push(format!("file: {file}"));
    }
    if let Some(function) = &error.function_name {
        origin.push(format!("function: {function}"));
    }
    if error.line_number > 0 {
        origin.push(format!("line: {}", error.line_number));
    }
    if !origin.is_empty() {
        lines.push(format!("Source: {}", origin.join(", ")));
    }

    if let Some(context) = &error.context {
        lines.push(format!("Context: {context}"));
    }

    match position {
        Some(position) if options.show_query && options.show_position => {
            let (display, caret) = window(query, position, options.max_query_length);
            lines.push(display);
            lines.push(format!("{}{yellow}^{reset}", " ".repeat(caret)));
        }
        None if options.show_query => {
            let chars = query.chars().count();
            let display = match options.max_query_length {
                Some(max) if chars > max => {
                    format!("{}...", query.chars().take(max).collect::<String>())
                }
                _ => query.to_string(),
            };
            lines.push(format!("Query: {display}"));
        }
        _ => {}
    }

    lines.join("\n")
}

/// Cut the query around `position` and return the text plus the caret column.
fn window(query: &str, position: usize, max_len: Option<usize>) -> (String, usize) {
    let chars: Vec<char> = query.chars().collect();
    let max = match max_len {
        Some(max) if chars.len() > max => max,
        _ => return (query.to_string(), position),
    };

    let start = position.saturating_sub(max / 2).min(chars.len());
    let end = (start + max).min(chars.len());

    let mut display = String::new();
    if start > 0 {
        display.push_str("...");
    }
    display.extend(&chars[start..end]);
    if end < chars.len() {
        display.push_str("...");
    }

    let caret = position - start + if start > 0 { 3 } else { 0 };
    (display, caret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::error::ErrorKind;

    fn syntax_error() -> ErrorEnvelope {
        ErrorEnvelope::new(ErrorKind::Engine, "syntax error at or near \"FORM\"")
            .with_function("parse_sql")
            .at(0, 10)
    }

    #[test]
    fn test_format_with_caret() {
        let report = format_sql_error(&syntax_error(), "SELECT * FORM users", &FormatOptions::default());
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "Error: syntax error at or near \"FORM\"");
        assert_eq!(lines[1], "Position: 9");
        assert_eq!(lines[2], "Source: function: parse_sql");
        assert_eq!(lines[3], "SELECT * FORM users");
        assert_eq!(lines[4], "         ^");
    }

    #[test]
    fn test_format_without_position_shows_query() {
        let err = ErrorEnvelope::empty_query();
        let report = format_sql_error(&err, "", &FormatOptions::default());
        assert_eq!(
            report,
            "Error: Invalid input: query cannot be null or empty\nQuery: "
        );
    }

    #[test]
    fn test_hidden_position_omits_query() {
        let options = FormatOptions {
            show_position: false,
            ..FormatOptions::default()
        };
        let report = format_sql_error(&syntax_error(), "SELECT * FORM users", &options);
        assert_eq!(
            report,
            "Error: syntax error at or near \"FORM\"\nPosition: 9\nSource: function: parse_sql"
        );
    }

    #[test]
    fn test_format_truncates_around_cursor() {
        let query = format!("SELECT {} FORM t", "a, ".repeat(40));
        let cursor = query.find("FORM").unwrap() as i32 + 1;
        let err = ErrorEnvelope::new(ErrorKind::Engine, "syntax error").at(0, cursor);
        let options = FormatOptions {
            max_query_length: Some(20),
            ..FormatOptions::default()
        };

        let report = format_sql_error(&err, &query, &options);
        let lines: Vec<&str> = report.lines().collect();
        let display = lines[2];
        let caret = lines[3];
        assert!(display.starts_with("..."));
        let caret_col = caret.find('^').unwrap();
        assert_eq!(&display[caret_col..caret_col + 4], "FORM");
    }

    #[test]
    fn test_format_color() {
        let options = FormatOptions {
            color: true,
            ..FormatOptions::default()
        };
        let report = format_sql_error(&syntax_error(), "SELECT * FORM users", &options);
        assert!(report.starts_with("\x1b[31mError:"));
        assert!(report.ends_with("^\x1b[0m"));
    }
}
