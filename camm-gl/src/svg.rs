// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Renders a tokenized CAMM-GL III stream back to SVG (C10, §4.9), for
//! visually verifying what the emitter produced. Rendering fidelity
//! beyond visual inspection is an explicit non-goal (§1).

use dxf_tree::Point2;

use crate::parse::{tokenize, Token};
use crate::state::Mode;

/// Command mnemonics this renderer understands the visual meaning of,
/// beyond pure tokenization. Anything outside this set is "unknown"
/// rather than merely "unimplemented" (§4.9).
const KNOWN_MNEMONICS: &[&str] =
    &["IN", "DT", "PA", "PR", "PU", "PD", "VS", "CI", "AA", "AR", "IW", "SI", "SL", "SP", "LB", "WD"];

#[derive(Clone, Copy, Debug)]
enum Pen {
    Up,
    Down,
}

/// Rendering options.
#[derive(Clone, Copy, Debug)]
pub struct SvgOptions {
    /// When set, each pen-up breaks the output into a separate `<path>`,
    /// colored by its index around the HSV ring.
    pub split: bool,
}

impl Default for SvgOptions {
    fn default() -> Self {
        SvgOptions { split: false }
    }
}

struct RenderContext {
    current: Point2,
    pen: Pen,
    mode: Mode,
    path: String,
    paths: Vec<String>,
    input_window: Option<(f64, f64, f64, f64)>,
}

impl RenderContext {
    fn new() -> Self {
        RenderContext {
            current: Point2::new(0.0, 0.0),
            pen: Pen::Up,
            mode: Mode::Absolute,
            path: String::new(),
            paths: Vec::new(),
            input_window: None,
        }
    }

    fn move_or_line(&mut self, p: Point2, split: bool) {
        match self.pen {
            Pen::Up => {
                if split && !self.path.is_empty() {
                    self.paths.push(std::mem::take(&mut self.path));
                }
                self.path.push_str(&format!("M {},{} ", fmt(p.x), fmt(p.y)));
            }
            Pen::Down => {
                self.path.push_str(&format!("L {},{} ", fmt(p.x), fmt(p.y)));
            }
        }
        self.current = p;
    }
}

fn fmt(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn parse_args(args: &[String]) -> Vec<f64> {
    args.iter().filter_map(|s| s.trim().parse::<f64>().ok()).collect()
}

fn handle_move_commands(mnemonic: &str, args: &[f64], ctx: &mut RenderContext, split: bool) {
    match mnemonic {
        "PA" => ctx.mode = Mode::Absolute,
        "PR" => ctx.mode = Mode::Relative,
        "PU" => ctx.pen = Pen::Up,
        "PD" => ctx.pen = Pen::Down,
        _ => {}
    }
    for pair in args.chunks_exact(2) {
        let p = match ctx.mode {
            Mode::Absolute => Point2::new(pair[0], pair[1]),
            Mode::Relative => Point2::new(ctx.current.x + pair[0], ctx.current.y + pair[1]),
        };
        ctx.move_or_line(p, split);
    }
}

fn rotate_around(p: Point2, center: Point2, degrees: f64) -> Point2 {
    let rel = p - center;
    center + rel.rotated_deg(degrees)
}

fn handle_arc(mnemonic: &str, args: &[f64], ctx: &mut RenderContext) {
    if args.len() < 3 {
        return;
    }
    let center = match mnemonic {
        "AA" => Point2::new(args[0], args[1]),
        "AR" => Point2::new(ctx.current.x + args[0], ctx.current.y + args[1]),
        _ => return,
    };
    let sweep_deg = args[2];
    let radius = ctx.current.distance(center);
    let end = rotate_around(ctx.current, center, sweep_deg);
    let large_arc = if sweep_deg.abs() > 180.0 { 1 } else { 0 };
    let sweep_flag = if sweep_deg > 0.0 { 1 } else { 0 };
    ctx.path.push_str(&format!(
        "A {},{} 0 {},{} {},{} ",
        fmt(radius),
        fmt(radius),
        large_arc,
        sweep_flag,
        fmt(end.x),
        fmt(end.y)
    ));
    ctx.current = end;
}

fn handle_circle(args: &[f64], ctx: &mut RenderContext) {
    let radius = match args.first() {
        Some(&r) => r,
        None => return,
    };
    let center = ctx.current;
    let top = Point2::new(center.x, center.y + radius);
    let bottom = Point2::new(center.x, center.y - radius);
    ctx.path.push_str(&format!(
        "M {},{} A {r},{r} 0 1,0 {},{} A {r},{r} 0 1,0 {},{} ",
        fmt(top.x),
        fmt(top.y),
        fmt(bottom.x),
        fmt(bottom.y),
        fmt(top.x),
        fmt(top.y),
        r = fmt(radius)
    ));
}

/// Colors path index `i` of `total` around the HSV ring (split mode).
fn hsv_ring_color(i: usize, total: usize) -> String {
    let hue = if total <= 1 { 0.0 } else { 360.0 * (i as f64) / (total as f64) };
    format!("hsl({}, 80%, 45%)", hue as i64)
}

/// Renders a CAMM-GL III instruction stream to an SVG document.
pub fn camm_to_svg(input: &str, opts: &SvgOptions) -> String {
    let tokens = tokenize(input, &mut |bad| {
        log::warn!("ignoring unparseable CAMM-GL token: {:?}", bad);
    });

    let mut ctx = RenderContext::new();

    for token in &tokens {
        match token {
            Token::Command { mnemonic, args } => {
                let nums = parse_args(args);
                match mnemonic.as_str() {
                    "IN" => {
                        ctx.pen = Pen::Up;
                        ctx.mode = Mode::Absolute;
                        ctx.current = Point2::new(0.0, 0.0);
                    }
                    "PA" | "PR" | "PU" | "PD" => handle_move_commands(mnemonic, &nums, &mut ctx, opts.split),
                    "AA" | "AR" => handle_arc(mnemonic, &nums, &mut ctx),
                    "CI" => handle_circle(&nums, &mut ctx),
                    "IW" => {
                        if nums.len() >= 4 {
                            ctx.input_window = Some((nums[0], nums[1], nums[2], nums[3]));
                        }
                    }
                    _ if KNOWN_MNEMONICS.contains(&mnemonic.as_str()) => {
                        log::warn!("{} is recognized but has no SVG contribution, ignoring", mnemonic);
                    }
                    _ => log::warn!("ignoring unknown command {}", mnemonic),
                }
            }
            Token::SetEscape(_) => {}
            Token::Text { mnemonic, .. } => {
                log::warn!("{} is recognized but has no SVG contribution, ignoring", mnemonic);
            }
            Token::Bang { mnemonic, .. } if mnemonic == "PG" => {
                // A page-feed is a documented no-op (§9 open question,
                // resolved conservatively: it does not segment output).
            }
            Token::Bang { mnemonic, .. } => {
                log::warn!("ignoring unimplemented bang-command {}", mnemonic);
            }
            Token::DeviceControl { code, .. } => {
                log::warn!("ignoring unimplemented device-control command .{}", code);
            }
            Token::Legacy { letter, .. } => {
                log::warn!("ignoring unimplemented legacy command {}", letter);
            }
            Token::BadInput(_) => {}
        }
    }

    if !ctx.path.is_empty() {
        ctx.paths.push(std::mem::take(&mut ctx.path));
    }

    render_document(&ctx)
}

fn render_document(ctx: &RenderContext) -> String {
    let (min_x, min_y, width, height) = match ctx.input_window {
        Some((x0, y0, x1, y1)) => (x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs()),
        None => (0.0, 0.0, 200.0, 200.0),
    };

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"{} {} {} {}\">\n",
        fmt(min_x),
        fmt(min_y),
        fmt(width),
        fmt(height)
    );
    svg.push_str(&format!(
        "  <g transform=\"translate(0,{}) scale(1,-1)\">\n",
        fmt(min_y + min_y + height)
    ));

    let total = ctx.paths.len();
    for (i, path) in ctx.paths.iter().enumerate() {
        let color = if total > 1 { hsv_ring_color(i, total) } else { "black".to_string() };
        svg.push_str(&format!(
            "    <path d=\"{}\" fill=\"none\" stroke=\"{}\"/>\n",
            path.trim_end(),
            color
        ));
    }

    svg.push_str("  </g>\n</svg>\n");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_5_movement_round_trips_to_an_equivalent_path() {
        let svg = camm_to_svg("IN;PA;PU0,0;PD100,0;PD100,100;PU;", &SvgOptions::default());
        assert!(svg.contains("M 0,0"));
        assert!(svg.contains("L 100,0"));
        assert!(svg.contains("L 100,100"));
    }

    #[test]
    fn split_mode_breaks_into_separate_paths_per_pen_lift() {
        let svg = camm_to_svg(
            "IN;PA;PU0,0;PD10,0;PU;PU20,20;PD30,20;PU;",
            &SvgOptions { split: true },
        );
        let count = svg.matches("<path").count();
        assert_eq!(count, 2);
    }

    #[test]
    fn page_feed_is_a_no_op() {
        let svg = camm_to_svg("IN;!PG0\nPA;PU0,0;PD1,0;PU;", &SvgOptions::default());
        assert!(svg.contains("M 0,0"));
        assert!(svg.contains("L 1,0"));
    }
}
