// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io::{self, Read, Write};
use std::process;

use pico_args::Arguments;

use camm_gl::{EmitOptions, Emitter, StreamSink};
use dxf_ir::{BoilDownOptions, PipelineOptions, StitchOptions};
use dxf_tree::Point2;

const HELP: &str = "\
dxf2camm converts a DXF drawing into a CAMM-GL III cutter instruction stream.

USAGE:
  dxf2camm [OPTIONS] [in-dxf]
  dxf2camm [OPTIONS] [in-dxf] --output out-camm

  With no [in-dxf], reads from stdin. With no --output, writes to stdout.

OPTIONS:
  -h, --help                  Prints help information
  -V, --version                Prints version information
  --quiet                      Disables warnings
  --output FILE                Writes the instruction stream to FILE

  --offset FLOAT                Knife trailing offset, in mm [default: 0]
  --offsetless-start            Do not offset the very first moveto
  --bbox FLOAT                  Append a bounding-box frame with this margin, in mm
  --align-knife                 Enable knife-offset compensation [default]
  --no-align-knife              Emit polylines directly, without knife-offset compensation
  --overlap FLOAT                Overlap length appended to closed polylines, in mm [default: 0]
  --raw                          Suppress the header/footer commands
  --relative                     Prefer relative move/line commands where applicable
  --epsilon FLOAT                Endpoint-coincidence tolerance used by stitching [default: 0.001]
  --shortline FLOAT              Arc-insertion short-line threshold, in mm [default: 1]
  --smallangle FLOAT             Arc-insertion turn-angle threshold, in degrees [default: 1]
  --coarsify FLOAT               Drop interior points closer than this, in mm [default: 0]
  --combine                      Run endpoint stitching [default]
  --no-combine                   Skip endpoint stitching
  --combine-cycles               Splice cycles sharing a point into each other [default]
  --no-combine-cycles            Do not splice cycles into each other
  --combine-reverse               Allow end-to-start joins with one side reversed [default]
  --no-combine-reverse            Only join matching winding direction
  --translate X,Y                 Translates all geometry, in drawing units [default: 0,0]
  --scale FLOAT                   Scales all geometry [default: 1]
  --sort CRITERIA                 Comma-separated partial-sort criteria, e.g. 'left-asc,box'

ARGS:
  <in-dxf>                      Input file
";

struct Args {
    quiet: bool,
    output: Option<String>,

    offset: f64,
    offsetless_start: bool,
    bbox: Option<f64>,
    align_knife: bool,
    overlap: f64,
    raw: bool,
    relative: bool,
    epsilon: f64,
    shortline: f64,
    smallangle: f64,
    coarsify: f64,
    combine: bool,
    combine_cycles: bool,
    combine_reverse: bool,
    translate: (f64, f64),
    scale: f64,
    sort: String,

    input: Option<String>,
}

fn collect_args() -> Result<Args, pico_args::Error> {
    let mut input = Arguments::from_env();

    if input.contains(["-h", "--help"]) {
        print!("{}", HELP);
        process::exit(0);
    }

    if input.contains(["-V", "--version"]) {
        println!("{}", env!("CARGO_PKG_VERSION"));
        process::exit(0);
    }

    let align_knife = resolve_pair(&mut input, "--align-knife", "--no-align-knife", true);
    let combine = resolve_pair(&mut input, "--combine", "--no-combine", true);
    let combine_cycles = resolve_pair(&mut input, "--combine-cycles", "--no-combine-cycles", true);
    let combine_reverse = resolve_pair(&mut input, "--combine-reverse", "--no-combine-reverse", true);

    Ok(Args {
        quiet: input.contains("--quiet"),
        output: input.opt_value_from_str("--output")?,

        offset: input.opt_value_from_fn("--offset", parse_f64)?.unwrap_or(0.0),
        offsetless_start: input.contains("--offsetless-start"),
        bbox: input.opt_value_from_fn("--bbox", parse_f64)?,
        align_knife,
        overlap: input.opt_value_from_fn("--overlap", parse_f64)?.unwrap_or(0.0),
        raw: input.contains("--raw"),
        relative: input.contains("--relative"),
        epsilon: input.opt_value_from_fn("--epsilon", parse_f64)?.unwrap_or(1e-3),
        shortline: input.opt_value_from_fn("--shortline", parse_f64)?.unwrap_or(1.0),
        smallangle: input.opt_value_from_fn("--smallangle", parse_f64)?.unwrap_or(1.0),
        coarsify: input.opt_value_from_fn("--coarsify", parse_f64)?.unwrap_or(0.0),
        combine,
        combine_cycles,
        combine_reverse,
        translate: input.opt_value_from_fn("--translate", parse_xy)?.unwrap_or((0.0, 0.0)),
        scale: input.opt_value_from_fn("--scale", parse_f64)?.unwrap_or(1.0),
        sort: input.opt_value_from_str("--sort")?.unwrap_or_default(),

        input: input.opt_free_from_str()?,
    })
}

/// Resolves a `--flag`/`--no-flag` pair to a single bool, defaulting to
/// `default` when neither is present. `--no-flag` wins if both are given.
fn resolve_pair(args: &mut Arguments, positive: &'static str, negative: &'static str, default: bool) -> bool {
    let neg = args.contains(negative);
    let pos = args.contains(positive);
    if neg {
        false
    } else if pos {
        true
    } else {
        default
    }
}

fn parse_f64(s: &str) -> Result<f64, String> {
    s.parse().map_err(|_| format!("'{}' is not a number", s))
}

fn parse_xy(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s.split_once(',').ok_or_else(|| "expected X,Y".to_string())?;
    Ok((parse_f64(x.trim())?, parse_f64(y.trim())?))
}

#[derive(Clone, PartialEq, Debug)]
enum InputFrom<'a> {
    Stdin,
    File(&'a str),
}

#[derive(Clone, PartialEq, Debug)]
enum OutputTo<'a> {
    Stdout,
    File(&'a str),
}

fn main() {
    let args = match collect_args() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {}.", e);
            process::exit(2);
        }
    };

    if !args.quiet {
        if let Ok(()) = log::set_logger(&LOGGER) {
            log::set_max_level(log::LevelFilter::Warn);
        }
    }

    if let Err(e) = process(args) {
        eprintln!("Error: {}.", e);
        process::exit(1);
    }
}

fn process(args: Args) -> Result<(), String> {
    let input_from = match args.input.as_deref() {
        None => InputFrom::Stdin,
        Some(path) => InputFrom::File(path),
    };
    let output_to = match args.output.as_deref() {
        None => OutputTo::Stdout,
        Some(path) => OutputTo::File(path),
    };

    let dxf_bytes = match input_from {
        InputFrom::Stdin => load_stdin()?,
        InputFrom::File(path) => std::fs::read(path).map_err(|e| e.to_string())?,
    };

    let mut tree = dxf_parser::parse(io::BufReader::new(&dxf_bytes[..])).map_err(|e| e.to_string())?;

    dxf_ir::canonicalize(&mut tree);
    dxf_ir::flatten(&mut tree).map_err(|e| e.to_string())?;
    dxf_ir::strip(&mut tree);
    dxf_ir::boil_down(&mut tree, &BoilDownOptions::default()).map_err(|e| e.to_string())?;

    let polylines = dxf_ir::extract_polylines(&tree).map_err(|e| e.to_string())?;

    let stitch_opts = StitchOptions {
        epsilon: args.epsilon,
        join_cycles: args.combine_cycles,
        reverse_allowed: args.combine_reverse,
        overlap: args.overlap,
        coarsen_threshold: args.coarsify.powi(2),
        sort: args.sort,
        crudeness: 1e-3,
    };
    let pipeline_opts = PipelineOptions {
        combine: args.combine,
        translate: Point2::new(args.translate.0, args.translate.1),
        scale: args.scale,
        bbox_margin: args.bbox,
        calibration: false,
    };
    let polylines = dxf_ir::process(polylines, &stitch_opts, &pipeline_opts).map_err(|e| e.to_string())?;

    // `EmitOptions`'s distances are in the same drawing units as the
    // polylines themselves; `units_per_mm` only scales coordinates at the
    // moment they're written as device units, so millimeter CLI values
    // pass straight through here.
    let emit_opts = EmitOptions {
        offset: args.offset,
        offsetless_start: args.offsetless_start,
        align_knife: args.align_knife,
        raw: args.raw,
        relative: args.relative,
        short_line_threshold: args.shortline,
        small_angle_threshold_deg: args.smallangle,
        idle_guard: true,
        ..EmitOptions::default()
    };

    let writer: Box<dyn Write> = match output_to {
        OutputTo::Stdout => Box::new(io::stdout()),
        OutputTo::File(path) => {
            Box::new(File::create(path).map_err(|_| "failed to create the output file".to_string())?)
        }
    };
    let mut sink = StreamSink(writer);
    let mut emitter = Emitter::new(&mut sink, emit_opts);
    emitter.emit_polylines(&polylines).map_err(|e| e.to_string())?;
    sink.0.flush().map_err(|_| "failed to flush the output".to_string())?;

    Ok(())
}

fn load_stdin() -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    io::stdin().lock().read_to_end(&mut buf).map_err(|_| "failed to read from stdin".to_string())?;
    Ok(buf)
}

/// A simple stderr logger.
static LOGGER: SimpleLogger = SimpleLogger;
struct SimpleLogger;
impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::LevelFilter::Warn
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let target = if record.target().len() > 0 {
                record.target()
            } else {
                record.module_path().unwrap_or_default()
            };

            let line = record.line().unwrap_or(0);
            let args = record.args();

            match record.level() {
                log::Level::Error => eprintln!("Error (in {}:{}): {}", target, line, args),
                log::Level::Warn => eprintln!("Warning (in {}:{}): {}", target, line, args),
                log::Level::Info => eprintln!("Info (in {}:{}): {}", target, line, args),
                log::Level::Debug => eprintln!("Debug (in {}:{}): {}", target, line, args),
                log::Level::Trace => eprintln!("Trace (in {}:{}): {}", target, line, args),
            }
        }
    }

    fn flush(&self) {}
}
