// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The group-code stream writer (§4.1 "Emit").

use std::collections::{HashMap, HashSet};
use std::io::Write;

use dxf_tree::{code_for_attr_name, end_node_for, NodeId, Result, Tree, Value};

/// Writes every child of the tree's root, depth-first, then the root's own
/// end-tag (`EOF`, synthesised if the tree carries none).
pub fn write_tree(tree: &Tree, w: &mut impl Write) -> Result<()> {
    for &child in tree.children(tree.root()) {
        write_node(tree, child, w)?;
    }

    match tree.end_tag(tree.root()) {
        Some(tag) => {
            writeln!(w, "0")?;
            writeln!(w, "{}", tag.name)?;
            write_attrs(w, &tag.attrs)?;
        }
        None => {
            writeln!(w, "0")?;
            writeln!(w, "EOF")?;
        }
    }
    Ok(())
}

fn write_node(tree: &Tree, id: NodeId, w: &mut impl Write) -> Result<()> {
    let name = tree.name(id);
    let code = if name.starts_with('$') { 9 } else { 0 };
    writeln!(w, "{}", code)?;
    writeln!(w, "{}", name)?;

    let attrs: HashMap<String, Value> =
        tree.attrs(id).map(|(k, v)| (k.to_string(), v.clone())).collect();
    write_attrs(w, &attrs)?;

    for &child in tree.children(id) {
        write_node(tree, child, w)?;
    }

    match tree.end_tag(id) {
        Some(tag) => {
            writeln!(w, "0")?;
            writeln!(w, "{}", tag.name)?;
            write_attrs(w, &tag.attrs)?;
        }
        None => {
            if let Some(end_name) = end_node_for(name) {
                writeln!(w, "0")?;
                writeln!(w, "{}", end_name)?;
            }
        }
    }

    Ok(())
}

/// Writes `attrs` in ascending group-code order, expanding any `x`-range
/// attribute into interleaved `(x,y,z)` triples with its parallel `y`/`z`
/// attributes (§4.1).
fn write_attrs(w: &mut impl Write, attrs: &HashMap<String, Value>) -> Result<()> {
    let mut names: Vec<&String> = attrs.keys().collect();
    names.sort_by_key(|n| code_for_attr_name(n).unwrap_or(u16::MAX));

    let mut handled: HashSet<String> = HashSet::new();

    for name in names {
        if handled.contains(name) {
            continue;
        }
        let code = match code_for_attr_name(name) {
            Some(c) => c,
            None => continue,
        };

        if (10..=18).contains(&code) {
            let suffix = &name[1..];
            let y_name = format!("y{}", suffix);
            let z_name = format!("z{}", suffix);

            let x_vals = attrs[name].as_slice();
            let empty: Vec<String> = Vec::new();
            let y_vals = attrs.get(&y_name).map(Value::as_slice).unwrap_or(&empty);
            let z_vals = attrs.get(&z_name).map(Value::as_slice).unwrap_or(&empty);

            for i in 0..x_vals.len() {
                writeln!(w, "{}", code)?;
                writeln!(w, "{}", x_vals[i])?;
                if let Some(v) = y_vals.get(i) {
                    writeln!(w, "{}", code_for_attr_name(&y_name).unwrap())?;
                    writeln!(w, "{}", v)?;
                }
                if let Some(v) = z_vals.get(i) {
                    writeln!(w, "{}", code_for_attr_name(&z_name).unwrap())?;
                    writeln!(w, "{}", v)?;
                }
            }
            handled.insert(y_name);
            handled.insert(z_name);
            continue;
        }

        for v in attrs[name].as_slice() {
            writeln!(w, "{}", code)?;
            writeln!(w, "{}", v)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{build_tree, read_records};
    use std::io::Cursor;

    fn parse(text: &str) -> Tree {
        let records = read_records(Cursor::new(text.as_bytes())).unwrap();
        build_tree(&records).unwrap()
    }

    fn emit(tree: &Tree) -> String {
        let mut buf = Vec::new();
        write_tree(tree, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn round_trips_a_simple_line() {
        let input = "0\nSECTION\n2\nENTITIES\n0\nLINE\n8\nA\n10\n0.0\n20\n0.0\n11\n100.0\n21\n50.0\n0\nENDSEC\n0\nEOF\n";
        let tree = parse(input);
        let output = emit(&tree);
        let tree2 = {
            let records = read_records(Cursor::new(output.as_bytes())).unwrap();
            build_tree(&records).unwrap()
        };

        let section = tree2.children(tree2.root())[0];
        let line = tree2.children(section)[0];
        assert_eq!(tree2.attr(line, "layer").unwrap().as_str(), "A");
        assert_eq!(tree2.attr(line, "x").unwrap().as_str(), "0.0");
        assert_eq!(tree2.attr(line, "x1").unwrap().as_str(), "100.0");
        assert_eq!(tree2.attr(line, "y1").unwrap().as_str(), "50.0");
    }

    #[test]
    fn interleaves_point_arrays() {
        let input =
            "0\nLWPOLYLINE\n10\n0.0\n20\n0.0\n10\n1.0\n20\n1.0\n10\n2.0\n20\n0.0\n0\nEOF\n";
        let tree = parse(input);
        let output = emit(&tree);

        let lines: Vec<&str> = output.lines().collect();
        // The x/y pairs must come out interleaved per point: 10,0.0,20,0.0,10,1.0,20,1.0,...
        let start = lines.iter().position(|&l| l == "LWPOLYLINE").unwrap() + 1;
        assert_eq!(&lines[start..start + 12], &[
            "10", "0.0", "20", "0.0", "10", "1.0", "20", "1.0", "10", "2.0", "20", "0.0",
        ]);
    }

    #[test]
    fn synthesises_missing_end_tag() {
        let mut tree = Tree::new();
        let root = tree.root();
        let section = tree.alloc("SECTION");
        tree.push_child(root, section);
        // no end_tag set on `section` — the writer must synthesise ENDSEC.

        let output = emit(&tree);
        assert!(output.contains("ENDSEC"));
        assert!(output.trim_end().ends_with("EOF"));
    }
}
