// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io::{self, Read, Write};
use std::process;

use pico_args::Arguments;

use camm_gl::{camm_to_svg, SvgOptions};

const HELP: &str = "\
camm2svg renders a CAMM-GL III instruction stream to SVG, for visually
verifying what an emitter produced.

USAGE:
  camm2svg [OPTIONS] [in-camm]
  camm2svg [OPTIONS] [in-camm] --output out-svg

  With no [in-camm], reads from stdin. With no --output, writes to stdout.

OPTIONS:
  -h, --help        Prints help information
  -V, --version      Prints version information
  --quiet            Disables warnings
  --output FILE       Writes the SVG document to FILE
  --split             Breaks the output into one path per pen-lift,
                      coloured by index around the HSV ring

ARGS:
  <in-camm>          Input file
";

struct Args {
    quiet: bool,
    output: Option<String>,
    split: bool,
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

    Ok(Args {
        quiet: input.contains("--quiet"),
        output: input.opt_value_from_str("--output")?,
        split: input.contains("--split"),
        input: input.opt_free_from_str()?,
    })
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

    let bytes = match input_from {
        InputFrom::Stdin => load_stdin()?,
        InputFrom::File(path) => std::fs::read(path).map_err(|e| e.to_string())?,
    };
    let camm = String::from_utf8_lossy(&bytes);

    let svg = camm_to_svg(&camm, &SvgOptions { split: args.split });

    match output_to {
        OutputTo::Stdout => {
            io::stdout().write_all(svg.as_bytes()).map_err(|_| "failed to write to the stdout".to_string())?;
        }
        OutputTo::File(path) => {
            let mut f = File::create(path).map_err(|_| "failed to create the output file".to_string())?;
            f.write_all(svg.as_bytes()).map_err(|_| "failed to write to the output file".to_string())?;
        }
    }

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
