// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The tolerant CAMM-GL III tokenizer (C10, §4.9). A hand-written
//! scanner with one explicit state per command family, per the §9
//! redesign note ("a hand-written scanner with explicit states per
//! command family is equally acceptable and often clearer" than one
//! large regex).

/// A recognized lexical unit of a CAMM-GL III instruction stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// A two-letter mnemonic with comma-separated numeric arguments,
    /// terminated by `;` (`PA1,2;`).
    Command { mnemonic: String, args: Vec<String> },
    /// `LB`/`WD`: text terminated by the current escape character.
    Text { mnemonic: String, text: String },
    /// `DT`: sets the escape character to a single following byte.
    SetEscape(u8),
    /// A `!`-prefixed two-letter command, newline-terminated.
    Bang { mnemonic: String, args: String },
    /// An `ESC.X` device-control command, `:`-terminated, `;`-separated
    /// arguments.
    DeviceControl { code: char, args: Vec<String> },
    /// A single-letter legacy (mode-1) command.
    Legacy { letter: char, args: String },
    /// Anything matching none of the above.
    BadInput(String),
}

const DEFAULT_ESCAPE: u8 = 0x03;

/// Scans `input` into a sequence of tokens. `on_bad_input` is invoked for
/// every non-whitespace run that fails to parse as any recognized
/// command family (§4.9: "whitespace-only bad input is silently
/// tolerated").
pub fn tokenize(input: &str, on_bad_input: &mut dyn FnMut(&str)) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut pos = 0;
    let mut escape_char = DEFAULT_ESCAPE;
    let mut tokens = Vec::new();

    while pos < bytes.len() {
        let b = bytes[pos];

        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if b == 0x1B {
            if let Some((tok, next)) = scan_device_control(input, bytes, pos) {
                tokens.push(tok);
                pos = next;
                continue;
            }
        } else if b == b'!' && is_two_upper(bytes, pos + 1) {
            let (tok, next) = scan_bang(input, bytes, pos);
            tokens.push(tok);
            pos = next;
            continue;
        } else if is_two_upper(bytes, pos) {
            let mnemonic = input[pos..pos + 2].to_string();
            match mnemonic.as_str() {
                "DT" => {
                    if let Some((tok, next)) = scan_set_escape(bytes, pos) {
                        if let Token::SetEscape(ch) = tok {
                            escape_char = ch;
                        }
                        tokens.push(tok);
                        pos = next;
                        continue;
                    }
                }
                "LB" | "WD" => {
                    if let Some((tok, next)) = scan_text(input, bytes, pos, &mnemonic, escape_char) {
                        tokens.push(tok);
                        pos = next;
                        continue;
                    }
                }
                _ => {
                    if let Some((tok, next)) = scan_command(input, bytes, pos, &mnemonic) {
                        tokens.push(tok);
                        pos = next;
                        continue;
                    }
                }
            }
        } else if b.is_ascii_uppercase() {
            let (tok, next) = scan_legacy(input, bytes, pos);
            tokens.push(tok);
            pos = next;
            continue;
        }

        let (bad, next) = scan_bad_input(input, bytes, pos);
        if !bad.trim().is_empty() {
            on_bad_input(&bad);
        }
        tokens.push(Token::BadInput(bad));
        pos = next;
    }

    tokens
}

fn is_two_upper(bytes: &[u8], pos: usize) -> bool {
    pos + 1 < bytes.len() && bytes[pos].is_ascii_uppercase() && bytes[pos + 1].is_ascii_uppercase()
}

fn find(bytes: &[u8], from: usize, target: u8) -> Option<usize> {
    bytes[from..].iter().position(|&b| b == target).map(|i| from + i)
}

fn scan_command(input: &str, bytes: &[u8], start: usize, mnemonic: &str) -> Option<(Token, usize)> {
    let args_start = start + 2;
    let end = find(bytes, args_start, b';')?;
    let args_str = &input[args_start..end];
    let args: Vec<String> = if args_str.is_empty() {
        Vec::new()
    } else {
        args_str.split(',').map(|s| s.trim().to_string()).collect()
    };
    Some((Token::Command { mnemonic: mnemonic.to_string(), args }, end + 1))
}

fn scan_set_escape(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let arg_pos = start + 2;
    let ch = *bytes.get(arg_pos)?;
    let mut next = arg_pos + 1;
    if bytes.get(next) == Some(&b';') || bytes.get(next) == Some(&b'\n') {
        next += 1;
    }
    Some((Token::SetEscape(ch), next))
}

fn scan_text(
    input: &str,
    bytes: &[u8],
    start: usize,
    mnemonic: &str,
    escape_char: u8,
) -> Option<(Token, usize)> {
    let text_start = start + 2;
    let end = find(bytes, text_start, escape_char)?;
    let text = input[text_start..end].to_string();
    Some((Token::Text { mnemonic: mnemonic.to_string(), text }, end + 1))
}

fn scan_bang(input: &str, bytes: &[u8], start: usize) -> (Token, usize) {
    let mnemonic = input[start + 1..start + 3].to_string();
    let args_start = start + 3;
    let end = find(bytes, args_start, b'\n').unwrap_or(bytes.len());
    let args = input[args_start..end].trim_end_matches('\r').to_string();
    let next = if end < bytes.len() { end + 1 } else { end };
    (Token::Bang { mnemonic, args }, next)
}

fn scan_device_control(input: &str, bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    if bytes.get(start + 1) != Some(&b'.') {
        return None;
    }
    let code = *bytes.get(start + 2)? as char;
    let args_start = start + 3;
    let end = find(bytes, args_start, b':')?;
    let args_str = &input[args_start..end];
    let args: Vec<String> = if args_str.is_empty() {
        Vec::new()
    } else {
        args_str.split(';').map(str::to_string).collect()
    };
    Some((Token::DeviceControl { code, args }, end + 1))
}

fn scan_legacy(input: &str, bytes: &[u8], start: usize) -> (Token, usize) {
    let letter = bytes[start] as char;
    let args_start = start + 1;
    let end = bytes[args_start..]
        .iter()
        .position(|&b| b == b';' || b.is_ascii_uppercase())
        .map(|i| args_start + i)
        .unwrap_or(bytes.len());
    let args = input[args_start..end].to_string();
    let next = if bytes.get(end) == Some(&b';') { end + 1 } else { end };
    (Token::Legacy { letter, args }, next)
}

fn scan_bad_input(input: &str, bytes: &[u8], start: usize) -> (String, usize) {
    let end = bytes[start..]
        .iter()
        .position(|&b| b.is_ascii_whitespace() || b.is_ascii_uppercase() || b == b'!' || b == 0x1B)
        .map(|i| start + i)
        .unwrap_or(bytes.len());
    let end = if end == start { start + 1 } else { end };
    (input[start..end].to_string(), end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_scenario_5_movement_stream() {
        let mut bad = Vec::new();
        let tokens = tokenize("IN;PA;PU0,0;PD100,0;PD100,100;PU;", &mut |s| bad.push(s.to_string()));
        assert!(bad.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::Command { mnemonic: "IN".into(), args: vec![] },
                Token::Command { mnemonic: "PA".into(), args: vec![] },
                Token::Command { mnemonic: "PU".into(), args: vec!["0".into(), "0".into()] },
                Token::Command { mnemonic: "PD".into(), args: vec!["100".into(), "0".into()] },
                Token::Command { mnemonic: "PD".into(), args: vec!["100".into(), "100".into()] },
                Token::Command { mnemonic: "PU".into(), args: vec![] },
            ]
        );
    }

    #[test]
    fn whitespace_only_bad_input_is_silently_tolerated() {
        let mut bad = Vec::new();
        tokenize("IN;   \n\t PA;", &mut |s| bad.push(s.to_string()));
        assert!(bad.is_empty());
    }

    #[test]
    fn non_whitespace_bad_input_is_reported() {
        let mut bad = Vec::new();
        tokenize("IN;@@@PA;", &mut |s| bad.push(s.to_string()));
        assert_eq!(bad, vec!["@@@".to_string()]);
    }

    #[test]
    fn dt_sets_escape_char_used_by_following_label_text() {
        let mut bad = Vec::new();
        let tokens = tokenize("DT%;LBhi%", &mut |s| bad.push(s.to_string()));
        assert!(bad.is_empty());
        assert_eq!(tokens[0], Token::SetEscape(b'%'));
        assert_eq!(tokens[1], Token::Text { mnemonic: "LB".into(), text: "hi".into() });
    }

    #[test]
    fn bang_command_is_newline_terminated() {
        let mut bad = Vec::new();
        let tokens = tokenize("!PG5\nIN;", &mut |s| bad.push(s.to_string()));
        assert_eq!(tokens[0], Token::Bang { mnemonic: "PG".into(), args: "5".into() });
        assert_eq!(tokens[1], Token::Command { mnemonic: "IN".into(), args: vec![] });
    }

    #[test]
    fn device_control_is_colon_terminated() {
        let mut bad = Vec::new();
        let input = format!("{}.@1;2:IN;", 0x1B as char);
        let tokens = tokenize(&input, &mut |s| bad.push(s.to_string()));
        assert_eq!(tokens[0], Token::DeviceControl { code: '@', args: vec!["1".into(), "2".into()] });
    }
}
