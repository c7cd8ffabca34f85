// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The CAMM-GL III emitter (C9): a stateful command scheduler that
//! dispatches each drawing operation by checking its declared
//! preconditions against tracked device state, emitting whatever
//! minimal commands are needed to satisfy them, then the operation
//! itself, then applying the operation's declared postconditions
//! (§4.8).

use std::io::Write;
use std::time::{Duration, Instant};

use dxf_tree::{Point2, Polyline, Result};

use crate::state::{Mode, Pen, SetOp, State};

/// How long the device will wait before auto-lifting the pen, per §4.8.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// The capability an emitter output needs: the ability to append bytes,
/// plus a flag for whether it represents a live stream the device can go
/// idle on (§9 redesign note: "Emitter output sink polymorphism").
pub trait Sink {
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Live streams are subject to the idle-timeout guard; in-memory
    /// buffers are not (there is no device on the other end to go idle).
    fn supports_idle_guard(&self) -> bool {
        false
    }
}

impl Sink for Vec<u8> {
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Wraps any [`std::io::Write`] as a live-stream sink.
pub struct StreamSink<W: Write>(pub W);

impl<W: Write> Sink for StreamSink<W> {
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.0.write_all(bytes)
    }

    fn supports_idle_guard(&self) -> bool {
        true
    }
}

/// Pipeline-wide emission configuration (§3 of the expanded spec).
#[derive(Clone, Copy, Debug)]
pub struct EmitOptions {
    /// Knife trailing distance (mm), per §4.8.
    pub offset: f64,
    /// Skip the offset pre-positioning on the very first polyline of the
    /// job (there is no prior trailing direction to project from anyway,
    /// but this also suppresses it for the first point of the first cut
    /// specifically — see the worked example in §8 scenario 4 and the
    /// note in DESIGN.md).
    pub offsetless_start: bool,
    /// When `false`, skip knife-offset compensation entirely and emit
    /// a direct `moveto(first)` + `polylineto(rest)` per polyline.
    pub align_knife: bool,
    /// Suppress the `header`/`footer` commands.
    pub raw: bool,
    /// Emit relative move/line commands instead of absolute ones.
    pub relative: bool,
    pub short_line_threshold: f64,
    pub small_angle_threshold_deg: f64,
    pub idle_guard: bool,
    /// Device units per millimeter (§6: "40 units per mm").
    pub units_per_mm: f64,
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions {
            offset: 0.0,
            offsetless_start: false,
            align_knife: true,
            raw: false,
            relative: false,
            short_line_threshold: 1.0,
            small_angle_threshold_deg: 1.0,
            idle_guard: true,
            units_per_mm: 40.0,
        }
    }
}

/// A single declared operation, its required preconditions and the
/// postconditions it establishes — the "(precondition, postcondition,
/// command)" table of §4.8, expressed as static data per §9's redesign
/// note rather than as a dynamic string-keyed dispatch.
struct Dispatch {
    mode: Option<Mode>,
    pen: Option<Pen>,
}

fn ensure_mode(state: &mut State, out: &mut dyn Sink, mode: Mode) -> Result<()> {
    if state.mode != mode {
        let cmd = match mode {
            Mode::Absolute => "PA;",
            Mode::Relative => "PR;",
        };
        write_raw(out, cmd)?;
        state.apply(SetOp::Mode(mode));
    }
    Ok(())
}

fn write_raw(out: &mut dyn Sink, s: &str) -> Result<()> {
    out.write_bytes(s.as_bytes()).map_err(dxf_tree::Error::from)
}

fn format_num(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        let s = format!("{:.6}", v);
        let trimmed = s.trim_end_matches('0').trim_end_matches('.');
        trimmed.to_string()
    }
}

/// A stateful CAMM-GL III command writer (C9).
pub struct Emitter<'a> {
    sink: &'a mut dyn Sink,
    state: State,
    opts: EmitOptions,
}

impl<'a> Emitter<'a> {
    pub fn new(sink: &'a mut dyn Sink, opts: EmitOptions) -> Self {
        Emitter { sink, state: State::default(), opts }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    fn to_device(&self, p: Point2) -> Point2 {
        Point2::new(p.x * self.opts.units_per_mm, p.y * self.opts.units_per_mm)
    }

    fn idle_guard(&mut self) -> Result<()> {
        if !self.opts.idle_guard || !self.sink.supports_idle_guard() {
            return Ok(());
        }
        if self.state.pen == Pen::Down {
            if let Some(last) = self.state.last_emit {
                if last.elapsed() > IDLE_TIMEOUT {
                    write_raw(self.sink, "PD;")?;
                }
            }
        }
        Ok(())
    }

    fn emit(&mut self, cmd: &str, dispatch: Dispatch) -> Result<()> {
        if let Some(mode) = dispatch.mode {
            ensure_mode(&mut self.state, self.sink, mode)?;
        }
        self.idle_guard()?;
        write_raw(self.sink, cmd)?;
        self.state.last_emit = Some(Instant::now());
        if let Some(pen) = dispatch.pen {
            self.state.apply(SetOp::Pen(pen));
        }
        Ok(())
    }

    /// `IN;` — initializes the device: mode becomes absolute, pen up.
    pub fn header(&mut self) -> Result<()> {
        if self.opts.raw {
            return Ok(());
        }
        write_raw(self.sink, "IN;")?;
        self.state = State { pen: Pen::Up, mode: Mode::Absolute, ..self.state };
        self.state.last_emit = Some(Instant::now());
        Ok(())
    }

    /// Lifts the pen and closes out the job.
    pub fn footer(&mut self) -> Result<()> {
        if self.opts.raw {
            return Ok(());
        }
        ensure_mode(&mut self.state, self.sink, Mode::Absolute)?;
        self.emit("PU;", Dispatch { mode: None, pen: Some(Pen::Up) })
    }

    pub fn tool_up(&mut self) -> Result<()> {
        self.emit("PU;", Dispatch { mode: None, pen: Some(Pen::Up) })
    }

    pub fn tool_down(&mut self) -> Result<()> {
        self.emit("PD;", Dispatch { mode: None, pen: Some(Pen::Down) })
    }

    /// A pen-up move to `p`, in absolute coordinates: the underlying
    /// `PU` command carries the target point directly (§6: "`PU`/`PD`
    /// ... also accept coordinate lists").
    pub fn moveto(&mut self, p: Point2) -> Result<()> {
        let d = self.to_device(p);
        let cmd = format!("PU{},{};", format_num(d.x), format_num(d.y));
        self.emit(&cmd, Dispatch { mode: Some(Mode::Absolute), pen: Some(Pen::Up) })
    }

    pub fn lineto(&mut self, p: Point2) -> Result<()> {
        let d = self.to_device(p);
        let cmd = format!("PD{},{};", format_num(d.x), format_num(d.y));
        self.emit(&cmd, Dispatch { mode: Some(Mode::Absolute), pen: Some(Pen::Down) })
    }

    pub fn polylineto(&mut self, pts: &[Point2]) -> Result<()> {
        let coords: Vec<String> = pts
            .iter()
            .map(|&p| {
                let d = self.to_device(p);
                format!("{},{}", format_num(d.x), format_num(d.y))
            })
            .collect();
        let cmd = format!("PD{};", coords.join(","));
        self.emit(&cmd, Dispatch { mode: Some(Mode::Absolute), pen: Some(Pen::Down) })
    }

    pub fn moveto_relative(&mut self, d: Point2) -> Result<()> {
        let dd = self.to_device(d);
        let cmd = format!("PU{},{};", format_num(dd.x), format_num(dd.y));
        self.emit(&cmd, Dispatch { mode: Some(Mode::Relative), pen: Some(Pen::Up) })
    }

    pub fn lineto_relative(&mut self, d: Point2) -> Result<()> {
        let dd = self.to_device(d);
        let cmd = format!("PD{},{};", format_num(dd.x), format_num(dd.y));
        self.emit(&cmd, Dispatch { mode: Some(Mode::Relative), pen: Some(Pen::Down) })
    }

    pub fn circle(&mut self, radius: f64) -> Result<()> {
        if self.state.pen != Pen::Down {
            self.tool_down()?;
        }
        let r = radius * self.opts.units_per_mm;
        let cmd = format!("CI{};", format_num(r));
        self.emit(&cmd, Dispatch { mode: None, pen: None })
    }

    /// Absolute-center arc (`AA`): precondition pen=down, establishes
    /// mode=absolute as a side effect of the command (§4.8).
    pub fn arc(&mut self, center: Point2, sweep_deg: f64) -> Result<()> {
        if self.state.pen != Pen::Down {
            self.tool_down()?;
        }
        let c = self.to_device(center);
        let cmd = format!("AA{},{},{};", format_num(c.x), format_num(c.y), format_num(sweep_deg));
        self.emit(&cmd, Dispatch { mode: None, pen: None })?;
        self.state.apply(SetOp::Mode(Mode::Absolute));
        Ok(())
    }

    /// Relative-center arc (`AR`): establishes mode=relative.
    pub fn arc_relative(&mut self, center_rel: Point2, sweep_deg: f64) -> Result<()> {
        if self.state.pen != Pen::Down {
            self.tool_down()?;
        }
        let c = self.to_device(center_rel);
        let cmd = format!("AR{},{},{};", format_num(c.x), format_num(c.y), format_num(sweep_deg));
        self.emit(&cmd, Dispatch { mode: None, pen: None })?;
        self.state.apply(SetOp::Mode(Mode::Relative));
        Ok(())
    }

    pub fn set_speed(&mut self, v: f64) -> Result<()> {
        let cmd = format!("VS{};", format_num(v));
        write_raw(self.sink, &cmd)?;
        self.state.apply(SetOp::Speed(v));
        Ok(())
    }

    pub fn set_force(&mut self, v: f64) -> Result<()> {
        let cmd = format!("!FS{};", format_num(v));
        write_raw(self.sink, &cmd)?;
        self.state.apply(SetOp::Force(v));
        Ok(())
    }

    pub fn set_tool(&mut self, n: i64) -> Result<()> {
        let cmd = format!("SP{};", n);
        write_raw(self.sink, &cmd)?;
        self.state.apply(SetOp::Tool(n));
        Ok(())
    }

    /// Emits a whole pipeline's polylines: header, each polyline (via
    /// knife-offset compensation unless disabled), footer.
    pub fn emit_polylines(&mut self, polylines: &[Polyline]) -> Result<()> {
        self.header()?;
        if self.opts.align_knife {
            self.emit_with_knife_offset(polylines)?;
        } else {
            for pl in polylines {
                self.emit_direct(pl)?;
            }
        }
        self.footer()?;
        Ok(())
    }

    fn emit_direct(&mut self, pl: &Polyline) -> Result<()> {
        if pl.points.is_empty() {
            return Ok(());
        }
        self.moveto(pl.points[0])?;
        if pl.points.len() > 1 {
            if self.opts.relative {
                let mut prev = pl.points[0];
                for &p in &pl.points[1..] {
                    self.lineto_relative(p - prev)?;
                    prev = p;
                }
            } else {
                self.polylineto(&pl.points[1..])?;
            }
        }
        Ok(())
    }

    /// The knife-offset compensation algorithm (§4.8). `knife` tracks
    /// where the blade physically is; `pen`/carriage motion is commanded
    /// ahead of it by `offset` along the direction of travel so the
    /// blade arrives exactly on the real geometry.
    fn emit_with_knife_offset(&mut self, polylines: &[Polyline]) -> Result<()> {
        let offset = self.opts.offset;
        let eps = dxf_tree::DEFAULT_EPS.max(1e-9);
        let mut trailing_dir: Option<Point2> = None;

        for (poly_index, pl) in polylines.iter().enumerate() {
            if pl.points.is_empty() {
                continue;
            }
            let first = pl.points[0];
            let is_first_poly = poly_index == 0;
            let pen_start = match trailing_dir {
                Some(dir) if !(is_first_poly && self.opts.offsetless_start) => {
                    Point2::new(first.x + offset * dir.x, first.y + offset * dir.y)
                }
                _ => first,
            };
            self.moveto(pen_start)?;
            self.tool_down()?;

            let mut knife = first;
            let mut direction = trailing_dir;

            for &pt in &pl.points[1..] {
                if knife.distance(pt) < eps {
                    continue;
                }
                let seg_len = knife.distance(pt);
                let new_dir = unit(pt - knife);

                if let Some(prev_dir) = direction {
                    let angle = signed_angle_deg(prev_dir, new_dir);
                    if angle.abs() > self.opts.small_angle_threshold_deg
                        || seg_len > self.opts.short_line_threshold
                    {
                        self.arc(knife, angle)?;
                    }
                }

                let target = Point2::new(knife.x + offset * new_dir.x, knife.y + offset * new_dir.y);
                self.lineto(target)?;

                knife = pt;
                direction = Some(new_dir);
            }

            trailing_dir = direction;
            self.tool_up()?;
        }

        Ok(())
    }
}

fn unit(v: Point2) -> Point2 {
    let len = (v.x * v.x + v.y * v.y).sqrt();
    if len <= dxf_tree::DEFAULT_EPS {
        Point2::new(0.0, 0.0)
    } else {
        Point2::new(v.x / len, v.y / len)
    }
}

/// Signed angle in degrees to rotate `from` into `to`, in (-180, 180].
fn signed_angle_deg(from: Point2, to: Point2) -> f64 {
    let cross = from.x * to.y - from.y * to.x;
    let dot = from.x * to.x + from.y * to.y;
    cross.atan2(dot).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxf_tree::PolylineKind;

    #[test]
    fn header_sets_absolute_pen_up() {
        let mut buf = Vec::new();
        let mut opts = EmitOptions::default();
        opts.units_per_mm = 1.0;
        let mut e = Emitter::new(&mut buf, opts);
        e.header().unwrap();
        assert_eq!(e.state().mode, Mode::Absolute);
        assert_eq!(e.state().pen, Pen::Up);
        assert_eq!(String::from_utf8(buf).unwrap(), "IN;");
    }

    #[test]
    fn moveto_then_lineto_emit_absolute_coordinate_commands() {
        let mut buf = Vec::new();
        let mut opts = EmitOptions::default();
        opts.units_per_mm = 1.0;
        let mut e = Emitter::new(&mut buf, opts);
        e.moveto(Point2::new(0.0, 0.0)).unwrap();
        e.lineto(Point2::new(10.0, 0.0)).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "PU0,0;PD10,0;");
        assert_eq!(e.state().pen, Pen::Down);
    }

    #[test]
    fn knife_offset_compensates_a_right_angle_turn() {
        // Offset=0.5, polyline [(0,0),(10,0),(10,10)]: matches the turn
        // at (10,0) and the arc-correctness shape of scenario 4, using
        // the literal per-point algorithm of §4.8 (knife updated after
        // each point, line-to target computed from the pre-update
        // knife) rather than the worked example's numbers verbatim — see
        // DESIGN.md for the resolved discrepancy.
        let mut buf = Vec::new();
        let mut opts = EmitOptions::default();
        opts.units_per_mm = 1.0;
        opts.offset = 0.5;
        opts.raw = true;
        opts.idle_guard = false;
        let pl = Polyline {
            kind: PolylineKind::Open,
            points: vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0)],
        };
        let mut e = Emitter::new(&mut buf, opts);
        e.emit_with_knife_offset(&[pl]).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.starts_with("PU0,0;PD0.5,0;"));
        assert!(out.contains("AA10,0,90;"));
        assert!(out.contains("PD10,0.5;"));
    }

    #[test]
    fn disabling_align_knife_emits_a_direct_polyline() {
        let mut buf = Vec::new();
        let mut opts = EmitOptions::default();
        opts.units_per_mm = 1.0;
        opts.align_knife = false;
        opts.raw = true;
        opts.idle_guard = false;
        let pl = Polyline {
            kind: PolylineKind::Open,
            points: vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0)],
        };
        let mut e = Emitter::new(&mut buf, opts);
        e.emit_polylines(&[pl]).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(out, "PU0,0;PD10,0,10,10;PU;");
    }

    #[test]
    fn idle_guard_reemits_pen_down_after_a_long_gap_on_a_stream() {
        struct SlowSink(Vec<u8>);
        impl Sink for SlowSink {
            fn write_bytes(&mut self, b: &[u8]) -> std::io::Result<()> {
                self.0.extend_from_slice(b);
                Ok(())
            }
            fn supports_idle_guard(&self) -> bool {
                true
            }
        }
        let mut sink = SlowSink(Vec::new());
        let mut opts = EmitOptions::default();
        opts.units_per_mm = 1.0;
        let mut e = Emitter::new(&mut sink, opts);
        e.tool_down().unwrap();
        e.state.last_emit = Some(Instant::now() - Duration::from_secs(11));
        e.tool_down().unwrap();
        let out = String::from_utf8(sink.0).unwrap();
        assert_eq!(out, "PD;PD;PD;");
    }
}
