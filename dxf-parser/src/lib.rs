// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Reads and writes the DXF group-code stream into and out of a
[`dxf_tree::Tree`] (C1/C2 of the design).
*/

#![forbid(unsafe_code)]

mod reader;
mod writer;

pub use reader::{build_tree, read_records, Record};
pub use writer::write_tree;

use std::io::{BufRead, Write};

use dxf_tree::{Result, Tree};

/// Parses a complete DXF stream into a [`Tree`] in one call.
pub fn parse(input: impl BufRead) -> Result<Tree> {
    let records = read_records(input)?;
    build_tree(&records)
}

/// Writes a complete [`Tree`] out as a DXF stream in one call.
pub fn emit(tree: &Tree, w: &mut impl Write) -> Result<()> {
    write_tree(tree, w)
}
