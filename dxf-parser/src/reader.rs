// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The group-code stream reader (§4.1 "Parse").
//!
//! Parsing happens in two passes. [`read_records`] turns the raw text into
//! a flat list of `(code, value)` pairs. [`build_tree`] then does a single
//! linear sweep over those records, using a starter stack to resolve
//! nesting and end-tag pairing as it goes — there's no need for a third
//! pass, since at any point during the sweep the "nearest unclosed
//! matching starter" is always whichever stack entry is closest to the
//! top.

use std::io::BufRead;

use dxf_tree::{end_node_for, starter_for_end_node, Error, Result, Tree, Value};

/// A single (code, value) pair off the wire.
#[derive(Clone, Debug)]
pub struct Record {
    pub code: u16,
    pub value: String,
}

/// Reads every `(code, value)` pair from `input`. Each pair occupies two
/// lines; leading whitespace on the code line and a trailing `\r` on
/// either line are tolerated.
pub fn read_records(input: impl BufRead) -> Result<Vec<Record>> {
    let mut lines = input.lines();
    let mut records = Vec::new();

    loop {
        let code_line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let code_line = code_line.trim_end_matches('\r');
        let trimmed = code_line.trim_start();
        if trimmed.is_empty() && lines_remaining_is_blank_tail(code_line) {
            continue;
        }

        let code: u16 = trimmed
            .trim()
            .parse()
            .map_err(|_| Error::ParseError(format!("'{}' is not a valid group code", trimmed)))?;

        let value_line = lines
            .next()
            .ok_or_else(|| Error::ParseError("unterminated group-code pair at end of input".to_string()))??;
        let value = value_line.trim_end_matches('\r').to_string();

        records.push(Record { code, value });
    }

    Ok(records)
}

/// A blank code line with nothing after it is just trailing whitespace in
/// the file, not a pair we need to skip a value line for.
fn lines_remaining_is_blank_tail(line: &str) -> bool {
    line.trim().is_empty()
}

struct OpenStarter {
    id: dxf_tree::NodeId,
    name: String,
}

/// Builds a [`Tree`] from a flat record list (the second half of §4.1
/// "Parse").
pub fn build_tree(records: &[Record]) -> Result<Tree> {
    let mut tree = Tree::new();
    let mut stack = vec![OpenStarter { id: tree.root(), name: "ROOT".to_string() }];

    let mut i = 0;
    while i < records.len() {
        let record = &records[i];

        if record.code == 0 || record.code == 9 {
            let name = record.value.clone();

            if let Some(starter_name) = starter_for_end_node(&name) {
                let pos = stack.iter().rposition(|open| open.name == starter_name);
                match pos {
                    Some(pos) => {
                        let mut attrs = std::collections::HashMap::new();
                        i += 1;
                        i = consume_attrs(records, i, &mut attrs)?;
                        tree.set_end_tag(
                            stack[pos].id,
                            dxf_tree::EndTag { name, attrs },
                        );
                        stack.truncate(pos);
                        continue;
                    }
                    None => {
                        log::warn!("unmatched end-node '{}', dropping", name);
                        i += 1;
                        let mut attrs = std::collections::HashMap::new();
                        i = consume_attrs(records, i, &mut attrs)?;
                        continue;
                    }
                }
            }

            let node = tree.alloc(name.clone());
            let parent = stack.last().expect("stack always has at least the root").id;
            tree.push_child(parent, node);

            i += 1;
            let mut attrs = std::collections::HashMap::new();
            i = consume_attrs(records, i, &mut attrs)?;
            for (k, v) in attrs {
                tree.set_attr(node, k, v);
            }

            if end_node_for(&name).is_some() {
                stack.push(OpenStarter { id: node, name });
            }
            continue;
        }

        // A stray non-(0|9) record with nothing to attach to (shouldn't
        // happen given `consume_attrs` below absorbs these, but guards
        // against a malformed leading record).
        i += 1;
    }

    if stack.iter().any(|open| open.name == "ROOT") {
        return Err(Error::ParseError("missing root EOF".to_string()));
    }

    Ok(tree)
}

/// Consumes every attribute record (non-0, non-9 code) starting at `i`,
/// folding repeats into a `Value::List`, and returns the index of the next
/// node-start record.
fn consume_attrs(
    records: &[Record],
    mut i: usize,
    out: &mut std::collections::HashMap<String, Value>,
) -> Result<usize> {
    while i < records.len() {
        let record = &records[i];
        if record.code == 0 || record.code == 9 {
            break;
        }
        let name = dxf_tree::attr_name_for_code(record.code).into_owned();
        match out.get_mut(&name) {
            Some(existing) => existing.push(record.value.clone()),
            None => {
                out.insert(name, Value::scalar(record.value.clone()));
            }
        }
        i += 1;
    }
    Ok(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn records_of(text: &str) -> Vec<Record> {
        read_records(Cursor::new(text.as_bytes())).unwrap()
    }

    #[test]
    fn reads_simple_pairs() {
        let records = records_of("0\nSECTION\n2\nHEADER\n0\nENDSEC\n0\nEOF\n");
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].code, 0);
        assert_eq!(records[0].value, "SECTION");
        assert_eq!(records[1].code, 2);
        assert_eq!(records[1].value, "HEADER");
    }

    #[test]
    fn tolerates_trailing_cr() {
        let records = records_of("0\r\nLINE\r\n0\r\nEOF\r\n");
        assert_eq!(records[0].value, "LINE");
    }

    #[test]
    fn builds_nested_sections() {
        let records = records_of(
            "0\nSECTION\n2\nENTITIES\n0\nLINE\n10\n0.0\n20\n0.0\n11\n100.0\n21\n50.0\n0\nENDSEC\n0\nEOF\n",
        );
        let tree = build_tree(&records).unwrap();
        let section = tree.children(tree.root())[0];
        assert_eq!(tree.name(section), "SECTION");
        assert_eq!(tree.attr(section, "name").unwrap().as_str(), "ENTITIES");
        assert!(tree.end_tag(section).is_some());

        let line = tree.children(section)[0];
        assert_eq!(tree.name(line), "LINE");
        assert_eq!(tree.attr(line, "x").unwrap().as_str(), "0.0");
        assert_eq!(tree.attr(line, "x1").unwrap().as_str(), "100.0");
    }

    #[test]
    fn missing_eof_is_fatal() {
        let records = records_of("0\nSECTION\n2\nHEADER\n0\nENDSEC\n");
        assert!(build_tree(&records).is_err());
    }

    #[test]
    fn unmatched_end_node_is_tolerated() {
        let records = records_of("0\nENDTAB\n0\nSECTION\n2\nHEADER\n0\nENDSEC\n0\nEOF\n");
        let tree = build_tree(&records).unwrap();
        assert_eq!(tree.child_count(tree.root()), 1);
    }

    #[test]
    fn repeated_attribute_promotes_to_list() {
        let records = records_of("0\nLWPOLYLINE\n10\n0.0\n10\n1.0\n10\n2.0\n0\nEOF\n");
        let tree = build_tree(&records).unwrap();
        let node = tree.children(tree.root())[0];
        match tree.attr(node, "x").unwrap() {
            Value::List(list) => assert_eq!(list, &["0.0", "1.0", "2.0"]),
            Value::Scalar(_) => panic!("expected a list"),
        }
    }
}
