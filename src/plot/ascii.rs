//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - each entity series gets its own marker (`o`, `x`, `+`, ...)
//! - reference series (cross-entity averages) use `:`
//! - consecutive present points are joined with `.`; a missing year breaks the line

use crate::domain::{Mode, SeriesGroup, SeriesRole};

const MARKERS: [char; 6] = ['o', 'x', '+', '*', '#', '@'];
const REFERENCE_MARKER: char = ':';

/// Render one group in the requested mode.
pub fn render_group_plot(group: &SeriesGroup, mode: Mode, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let mode = group.effective_mode(mode);

    let mut entity_idx = 0usize;
    let lines: Vec<(char, &str, Vec<Vec<(f64, f64)>>)> = group
        .series_for(mode)
        .map(|s| {
            let marker = match s.role {
                SeriesRole::Reference => REFERENCE_MARKER,
                SeriesRole::Entity => {
                    let m = MARKERS[entity_idx % MARKERS.len()];
                    entity_idx += 1;
                    m
                }
            };
            (marker, s.label.as_str(), s.present_runs())
        })
        .collect();

    let mut out = String::new();
    out.push_str(&format!("{} [{}]\n", group.title, mode.display_name()));

    let points = lines.iter().flat_map(|(_, _, segs)| segs.iter().flatten());
    let Some((x_min, x_max, y_min, y_max)) = bounds(points) else {
        out.push_str("(no data)\n");
        return out;
    };
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);
    let (x_min, x_max) = if x_max > x_min { (x_min, x_max) } else { (x_min - 1.0, x_max + 1.0) };

    let mut grid = vec![vec![' '; width]; height];

    // Lines first so markers overlay them.
    for (_, _, segs) in &lines {
        for seg in segs {
            for pair in seg.windows(2) {
                let (x0, y0) = (map_x(pair[0].0, x_min, x_max, width), map_y(pair[0].1, y_min, y_max, height));
                let (x1, y1) = (map_x(pair[1].0, x_min, x_max, width), map_y(pair[1].1, y_min, y_max, height));
                draw_line(&mut grid, x0, y0, x1, y1, '.');
            }
        }
    }
    // Reverse so the first series ends up on top.
    for (marker, _, segs) in lines.iter().rev() {
        for &(x, y) in segs.iter().flatten() {
            grid[map_y(y, y_min, y_max, height)][map_x(x, x_min, x_max, width)] = *marker;
        }
    }

    out.push_str(&format!(
        "Plot: years=[{x_min:.0}, {x_max:.0}] | y=[{y_min:.2}, {y_max:.2}]\n"
    ));
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }

    let legend: Vec<String> = lines.iter().map(|(m, label, _)| format!("{m} {label}")).collect();
    out.push_str(&legend.join("  "));
    out.push('\n');
    out
}

fn bounds<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> Option<(f64, f64, f64, f64)> {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if x_min.is_finite() && y_min.is_finite() {
        Some((x_min, x_max, y_min, y_max))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = if span > 0.0 { span * frac } else { min.abs().max(1.0) * frac };
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish); only fills blank cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
