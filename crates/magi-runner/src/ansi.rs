//! Terminal escape stripping for PTY output

/// Strip ANSI/VT escape sequences and stray control characters.
///
/// Handles CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL` or `ESC ] ... ESC \`),
/// charset designators (`ESC ( B`) and two-byte escapes (`ESC =`, `ESC 7`).
/// Carriage returns are dropped since the PTY line discipline emits `\r\n`.
/// Newlines and tabs are kept.
pub fn strip_ansi_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    // Parameter and intermediate bytes (0x20–0x3F)
                    while let Some(&next) = chars.peek() {
                        if next.is_ascii() && (0x20..=0x3F).contains(&(next as u8)) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    // Final byte (0x40–0x7E)
                    if let Some(&next) = chars.peek() {
                        if next.is_ascii() && (0x40..=0x7E).contains(&(next as u8)) {
                            chars.next();
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                Some('(') | Some(')') | Some('*') | Some('+') => {
                    chars.next();
                    chars.next();
                }
                Some(_) => {
                    chars.next();
                }
                None => {}
            },
            '\n' | '\t' => result.push(c),
            c if c.is_control() => {}
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_color_codes() {
        let input = "\x1b[32mHello\x1b[0m World\r\n";
        assert_eq!(strip_ansi_escapes(input), "Hello World\n");
    }

    #[test]
    fn test_strip_osc_title() {
        let input = "\x1b]0;claude\x07ready\n";
        assert_eq!(strip_ansi_escapes(input), "ready\n");

        let input = "\x1b]8;;https://example.com\x1b\\link\x1b]8;;\x1b\\";
        assert_eq!(strip_ansi_escapes(input), "link");
    }

    #[test]
    fn test_strip_cursor_and_charset() {
        let input = "\x1b[?25l\x1b(Bspinner\x1b[2K\x1b[1G\x1b=done\x1b[?25h";
        assert_eq!(strip_ansi_escapes(input), "spinnerdone");
    }

    #[test]
    fn test_control_chars_removed_tabs_kept() {
        let input = "a\x07b\x08c\td";
        assert_eq!(strip_ansi_escapes(input), "abc\td");
    }

    #[test]
    fn test_truncated_escape_at_end() {
        assert_eq!(strip_ansi_escapes("text\x1b"), "text");
        assert_eq!(strip_ansi_escapes("text\x1b[31"), "text");
    }

    #[test]
    fn test_unicode_preserved() {
        let input = "\x1b[1m✻ 안녕하세요\x1b[0m";
        assert_eq!(strip_ansi_escapes(input), "✻ 안녕하세요");
    }
}
