//! POSIX-ish word splitting for command lines.
//!
//! Used for `COMP_LINE` during completion and for whole-line invocation.
//! Single quotes are literal, double quotes honour backslash escapes of
//! `"`, `\`, `$` and `` ` ``, and a bare backslash escapes the next char.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Result of splitting a possibly unfinished line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Split {
    /// Words terminated by whitespace.
    pub words: Vec<String>,
    /// The trailing word being typed (empty after trailing whitespace).
    pub partial: String,
    /// True when the line ends inside an open quote.
    pub unterminated: bool,
}

/// Splits `line`, keeping the last unterminated word apart.
pub fn split_partial(line: &str) -> Split {
    let mut split = Split::default();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match quote {
            Quote::Single => {
                if ch == '\'' {
                    quote = Quote::None;
                } else {
                    current.push(ch);
                }
            }
            Quote::Double => match ch {
                '"' => quote = Quote::None,
                '\\' => match chars.peek() {
                    Some(&next) if matches!(next, '"' | '\\' | '$' | '`') => {
                        current.push(next);
                        chars.next();
                    }
                    _ => current.push('\\'),
                },
                _ => current.push(ch),
            },
            Quote::None => match ch {
                '\'' => {
                    quote = Quote::Single;
                    in_word = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_word = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        split.words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }

    split.unterminated = quote != Quote::None;
    split.partial = current;
    split
}

/// Splits a complete line into words.
pub fn split(line: &str) -> Vec<String> {
    let Split {
        mut words, partial, ..
    } = split_partial(line);
    let ends_in_word = line
        .chars()
        .last()
        .is_some_and(|c| !c.is_whitespace());
    if !partial.is_empty() || ends_in_word {
        words.push(partial);
    }
    words
}
