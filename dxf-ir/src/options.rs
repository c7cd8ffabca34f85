// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Plain configuration structs for the transforms in this crate, in the
//! style of `usvg::Options` — passed by reference, no global state.

use dxf_tree::Point2;

/// Options for [`crate::postprocess::process`] (§4.6).
#[derive(Clone, Copy, Debug)]
pub struct StitchOptions {
    /// Distance within which two endpoints are considered coincident.
    pub epsilon: f64,
    /// Whether to splice polylines sharing an internal point into cycles.
    pub join_cycles: bool,
    /// Whether end-to-end/start-to-start joins (with one side reversed)
    /// are attempted.
    pub reverse_allowed: bool,
    /// Overlap length appended to each closed polyline's trace.
    pub overlap: f64,
    /// Squared-distance threshold below which an interior point is
    /// dropped during coarsening (0 disables coarsening).
    pub coarsen_threshold: f64,
    /// Comma-separated sort criteria, e.g. `"left-asc,box"` (§4.6).
    pub sort: String,
    /// Quantisation step used when sorting by a numeric criterion.
    pub crudeness: f64,
}

impl Default for StitchOptions {
    fn default() -> Self {
        StitchOptions {
            epsilon: 1e-3,
            join_cycles: true,
            reverse_allowed: true,
            overlap: 0.0,
            coarsen_threshold: 0.0,
            sort: String::new(),
            crudeness: 1e-3,
        }
    }
}

/// Options for [`crate::boildown::boil_down`] (§4.4).
#[derive(Clone, Debug)]
pub struct BoilDownOptions {
    /// The entity kinds the caller is willing to keep as leaves.
    pub acceptable: Vec<String>,
}

impl Default for BoilDownOptions {
    fn default() -> Self {
        BoilDownOptions { acceptable: vec!["POINT".to_string(), "LWPOLYLINE".to_string()] }
    }
}

/// Options for the whole-of-§4.6 pipeline orchestrated by
/// [`crate::postprocess::process`]: whether stitching runs at all, the
/// post-stitch translate/scale, and the two polylines appended around the
/// job (a calibration mark, a bbox frame) — the CLI-level concerns that sit
/// above plain stitching (`--combine`, `--translate`, `--scale`, `--bbox`).
#[derive(Clone, Copy, Debug)]
pub struct PipelineOptions {
    /// Whether to run the stitch step at all (`--combine`/`--no-combine`).
    pub combine: bool,
    pub translate: Point2,
    pub scale: f64,
    /// Margin (in drawing units) of a rectangular frame appended around
    /// the overall bounding box of the job, or `None` to omit it.
    pub bbox_margin: Option<f64>,
    /// Whether to prepend a small fixed calibration mark.
    pub calibration: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            combine: true,
            translate: Point2::new(0.0, 0.0),
            scale: 1.0,
            bbox_margin: None,
            calibration: false,
        }
    }
}
