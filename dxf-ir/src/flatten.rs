// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The block flattener (C5, §4.3): resolves every `INSERT` against its
//! referenced `BLOCK`, applying the per-axis scale / rotation / row-col
//! array transform, then empties `BLOCKS`.
//!
//! The conventional AutoCAD group codes for `INSERT`'s transform fields
//! (41/42 scale, 50 rotation, 70/71 row-col counts, 44/45 spacing) land,
//! under §6's range table, on `float1`/`float2`/`angle`/`int`/`int1`/
//! `float4`/`float5` respectively.

use std::collections::HashSet;

use dxf_tree::{Error, NodeId, Point2, Result, Transform, Tree};

use crate::walker::{find_section, walk, FilterOutcome};

struct BlockDef {
    anchor: Point2,
    children: Vec<NodeId>,
}

/// Supported `BLOCK` child kinds (§4.3) — notably, `INSERT` is not among
/// them, so a `BLOCK` referencing another block is rejected as
/// not-implemented rather than resolved recursively.
const SUPPORTED_CHILD_KINDS: &[&str] = &["LINE", "SPLINE", "POINT", "LWPOLYLINE"];

fn collect_blocks(tree: &Tree, root: NodeId) -> std::collections::HashMap<String, BlockDef> {
    let mut blocks = std::collections::HashMap::new();
    let Some(section) = find_section(tree, root, "BLOCKS") else {
        return blocks;
    };
    for &block in tree.children(section) {
        if tree.name(block) != "BLOCK" {
            continue;
        }
        let name = match tree.attr(block, "name") {
            Some(v) => v.as_str().to_string(),
            None => continue,
        };
        let anchor = match (tree.attr(block, "x"), tree.attr(block, "y")) {
            (Some(x), Some(y)) => {
                Point2::new(x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0))
            }
            _ => Point2::new(0.0, 0.0),
        };
        let children = tree.children(block).to_vec();
        blocks.insert(name, BlockDef { anchor, children });
    }
    blocks
}

/// Resolves every `INSERT` in `ENTITIES` against its `BLOCK`, then empties
/// `BLOCKS` (§3 "Blocks live only during flattening").
pub fn flatten(tree: &mut Tree) -> Result<()> {
    let root = tree.root();
    let blocks = collect_blocks(tree, root);

    if let Some(entities) = find_section(tree, root, "ENTITIES") {
        let mut in_progress: HashSet<String> = HashSet::new();
        let mut error: Option<Error> = None;

        walk(
            tree,
            entities,
            &mut |tree, id| {
                if error.is_some() || tree.name(id) != "INSERT" {
                    return FilterOutcome::keep();
                }
                match resolve_insert(tree, &blocks, &mut in_progress, id) {
                    Ok(replacement) => FilterOutcome::replace(replacement),
                    Err(e) => {
                        error = Some(e);
                        FilterOutcome::keep()
                    }
                }
            },
            &mut |_, _| FilterOutcome::keep(),
        );

        if let Some(e) = error {
            return Err(e);
        }
    }

    if let Some(blocks_section) = find_section(tree, root, "BLOCKS") {
        tree.set_children(blocks_section, Vec::new());
    }
    Ok(())
}

fn resolve_insert(
    tree: &mut Tree,
    blocks: &std::collections::HashMap<String, BlockDef>,
    in_progress: &mut HashSet<String>,
    insert_id: NodeId,
) -> Result<Vec<NodeId>> {
    let block_name = tree
        .attr(insert_id, "name")
        .ok_or_else(|| Error::InvalidArgument("INSERT has no block name".into()))?
        .as_str()
        .to_string();

    if in_progress.contains(&block_name) {
        return Err(Error::NotImplemented(format!("recursive BLOCK reference: '{}'", block_name)));
    }
    let block = blocks
        .get(&block_name)
        .ok_or_else(|| Error::InvalidArgument(format!("INSERT references unknown BLOCK '{}'", block_name)))?;

    let insert_point = Point2::new(
        tree.attr(insert_id, "x").ok_or_else(|| Error::InvalidArgument("INSERT missing x".into()))?.as_f64()?,
        tree.attr(insert_id, "y").ok_or_else(|| Error::InvalidArgument("INSERT missing y".into()))?.as_f64()?,
    );
    let scale_x = optional_f64(tree, insert_id, "float1")?.unwrap_or(1.0);
    let scale_y = optional_f64(tree, insert_id, "float2")?.unwrap_or(1.0);
    let rotation_deg = optional_f64(tree, insert_id, "angle")?.unwrap_or(0.0);
    let columns = optional_i64(tree, insert_id, "int")?.unwrap_or(1).max(1) as u32;
    let rows = optional_i64(tree, insert_id, "int1")?.unwrap_or(1).max(1) as u32;
    let col_spacing = optional_f64(tree, insert_id, "float4")?.unwrap_or(0.0);
    let row_spacing = optional_f64(tree, insert_id, "float5")?.unwrap_or(0.0);

    let anchor = block.anchor;
    let children = block.children.clone();

    for &child in &children {
        if !SUPPORTED_CHILD_KINDS.contains(&tree.name(child)) {
            return Err(Error::NotImplemented(format!(
                "BLOCK '{}' has unsupported child kind '{}'",
                block_name,
                tree.name(child)
            )));
        }
        if tree.child_count(child) > 0 {
            return Err(Error::NotImplemented(format!(
                "BLOCK '{}' child '{}' has unexpected grandchildren",
                block_name,
                tree.name(child)
            )));
        }
    }

    in_progress.insert(block_name.clone());

    let mut out = Vec::with_capacity((rows * columns) as usize * children.len());
    for row in 0..rows {
        for col in 0..columns {
            // `Transform`/`Point2::rotated_deg` rotate counter-clockwise for
            // positive angles, but INSERT's rotation (group code 50) turns
            // the block clockwise for positive degrees (§8 scenario 2); negate
            // here rather than in the shared primitive.
            let transform = Transform {
                translate_x: insert_point.x + col as f64 * col_spacing,
                translate_y: insert_point.y + row as f64 * row_spacing,
                scale_x,
                scale_y,
                rotation_deg: -rotation_deg,
            };
            for &child in &children {
                out.push(transform_entity(tree, child, anchor, &transform));
            }
        }
    }

    in_progress.remove(&block_name);
    Ok(out)
}

fn optional_f64(tree: &Tree, id: NodeId, name: &str) -> Result<Option<f64>> {
    tree.attr(id, name).map(|v| v.as_f64()).transpose()
}

fn optional_i64(tree: &Tree, id: NodeId, name: &str) -> Result<Option<i64>> {
    tree.attr(id, name).map(|v| v.as_i64()).transpose()
}

/// Clones `child`, rewriting its point-bearing attributes by subtracting
/// `anchor`, then applying `transform` (§4.3).
fn transform_entity(tree: &mut Tree, child: NodeId, anchor: Point2, transform: &Transform) -> NodeId {
    let clone = tree.clone_subtree(child);
    match tree.name(clone) {
        "LINE" => {
            transform_point_pair(tree, clone, "x", "y", anchor, transform);
            transform_point_pair(tree, clone, "x1", "y1", anchor, transform);
        }
        "POINT" => {
            transform_point_pair(tree, clone, "x", "y", anchor, transform);
        }
        "LWPOLYLINE" | "SPLINE" => {
            transform_point_list(tree, clone, "x", "y", anchor, transform);
        }
        _ => unreachable!("unsupported child kind filtered before reaching transform_entity"),
    }
    clone
}

fn transform_point_pair(tree: &mut Tree, id: NodeId, x_name: &str, y_name: &str, anchor: Point2, transform: &Transform) {
    let x = tree.attr(id, x_name).and_then(|v| v.as_f64().ok()).unwrap_or(0.0);
    let y = tree.attr(id, y_name).and_then(|v| v.as_f64().ok()).unwrap_or(0.0);
    let local = Point2::new(x, y) - anchor;
    let world = transform.apply(local);
    tree.set_attr(id, x_name, world.x);
    tree.set_attr(id, y_name, world.y);
}

fn transform_point_list(tree: &mut Tree, id: NodeId, x_name: &str, y_name: &str, anchor: Point2, transform: &Transform) {
    let xs = tree.attr(id, x_name).and_then(|v| v.as_f64_list().ok()).unwrap_or_default();
    let ys = tree.attr(id, y_name).and_then(|v| v.as_f64_list().ok()).unwrap_or_default();

    tree.set_attr(id, x_name, dxf_tree::Value::List(Vec::new()));
    tree.remove_attr(id, x_name);
    tree.set_attr(id, y_name, dxf_tree::Value::List(Vec::new()));
    tree.remove_attr(id, y_name);

    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let local = Point2::new(x, y) - anchor;
        let world = transform.apply(local);
        tree.push_attr(id, x_name, dxf_tree::format_float(world.x));
        tree.push_attr(id, y_name, dxf_tree::format_float(world.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_block_and_insert() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let root = tree.root();

        let blocks_section = tree.alloc("SECTION");
        tree.set_attr(blocks_section, "name", "BLOCKS");
        tree.push_child(root, blocks_section);

        let block = tree.alloc("BLOCK");
        tree.set_attr(block, "name", "B");
        tree.set_attr(block, "x", 10.0);
        tree.set_attr(block, "y", 0.0);
        let line = tree.alloc("LINE");
        tree.set_attr(line, "x", 0.0);
        tree.set_attr(line, "y", 0.0);
        tree.set_attr(line, "x1", 10.0);
        tree.set_attr(line, "y1", 0.0);
        tree.push_child(block, line);
        tree.push_child(blocks_section, block);

        let entities = tree.alloc("SECTION");
        tree.set_attr(entities, "name", "ENTITIES");
        tree.push_child(root, entities);

        let insert = tree.alloc("INSERT");
        tree.set_attr(insert, "name", "B");
        tree.set_attr(insert, "x", 100.0);
        tree.set_attr(insert, "y", 200.0);
        tree.set_attr(insert, "float1", 2.0);
        tree.set_attr(insert, "float2", 1.0);
        tree.set_attr(insert, "angle", 90.0);
        tree.push_child(entities, insert);

        (tree, entities)
    }

    #[test]
    fn insert_resolves_to_transformed_line() {
        let (mut tree, entities) = build_block_and_insert();
        flatten(&mut tree).unwrap();

        assert_eq!(tree.child_count(entities), 1);
        let line = tree.children(entities)[0];
        assert_eq!(tree.name(line), "LINE");

        let x = tree.attr(line, "x").unwrap().as_f64().unwrap();
        let y = tree.attr(line, "y").unwrap().as_f64().unwrap();
        let x1 = tree.attr(line, "x1").unwrap().as_f64().unwrap();
        let y1 = tree.attr(line, "y1").unwrap().as_f64().unwrap();

        // BLOCK anchor (10,0), line (0,0)->(10,0); scale (2,1), rotate 90
        // (clockwise, per INSERT's group-code-50 convention), translate
        // (100,200): local (0,0)->(10,0) after subtracting anchor:
        // (-10,0)->(0,0); scaled: (-20,0)->(0,0); rotated 90 CW:
        // (0,20)->(0,0); translated: (100,220)->(100,200).
        assert!((x - 100.0).abs() < 1e-9);
        assert!((y - 220.0).abs() < 1e-9);
        assert!((x1 - 100.0).abs() < 1e-9);
        assert!((y1 - 200.0).abs() < 1e-9);
    }

    #[test]
    fn blocks_section_is_emptied() {
        let (mut tree, _) = build_block_and_insert();
        flatten(&mut tree).unwrap();
        let blocks = find_section(&tree, tree.root(), "BLOCKS").unwrap();
        assert_eq!(tree.child_count(blocks), 0);
    }

    #[test]
    fn unknown_block_reference_is_invalid_argument() {
        let (mut tree, entities) = build_block_and_insert();
        let insert = tree.children(entities)[0];
        tree.set_attr(insert, "name", "MISSING");
        assert!(flatten(&mut tree).is_err());
    }
}
