// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A stateful CAMM-GL III emitter (C9) and a tolerant CAMM-GL parser
//! with an SVG renderer (C10), used to verify what the emitter
//! produced.

#![forbid(unsafe_code)]

mod emit;
mod parse;
mod state;
mod svg;

pub use emit::{Emitter, EmitOptions, Sink, StreamSink};
pub use parse::{tokenize, Token};
pub use state::{Mode, Pen, SetOp, State};
pub use svg::{camm_to_svg, SvgOptions};

pub use dxf_tree::{Error, Result};
