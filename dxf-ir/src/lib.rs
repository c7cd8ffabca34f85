// Copyright 2024 the knifecut authors
// Use of this source code is governed by a MIT license that can be
// found in the COPYING file.

//! The transform layer of the `knifecut` DXF toolkit: tree walker and
//! filters (C3), the entity rewriter ("boil-down", C4), the block
//! flattener (C5), the polyline extractor (C6) and post-processor (C7),
//! the spatial endpoint index (C8), and the XML mirror.
//!
//! Everything here operates on a `dxf_tree::Tree` produced by `dxf-parser`
//! and hands polylines off to `camm-gl` for emission.

#![forbid(unsafe_code)]

mod boildown;
mod extract;
mod flatten;
mod options;
mod postprocess;
mod spatial;
mod walker;
mod xml;

pub use boildown::boil_down;
pub use extract::extract_polylines;
pub use flatten::flatten;
pub use options::{BoilDownOptions, PipelineOptions, StitchOptions};
pub use postprocess::{add_overlap, coarsen, process, stitch};
pub use walker::{
    by_color, by_layer, canonicalize, filter, find_section, parse_criterion, strip, walk,
    walk_shallow, Criterion, FilterOutcome, Polarity,
};
pub use xml::{tree_to_xml, xml_to_tree};

pub use dxf_tree::{Error, Result};
