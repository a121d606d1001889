//! Two-threshold Canny edge detection.
//!
//! Follows the classic OpenCV operator: 3x3 Sobel gradients with replicated borders, the color
//! channel with the strongest L1 gradient wins per pixel, non-maximum suppression along four
//! quantized directions, then hysteresis. No pre-blur is applied.

use image::{DynamicImage, GrayImage, Luma, RgbImage};

pub const EDGE_ON: u8 = 255;

/// Hysteresis thresholds on the L1 gradient magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeThresholds {
    pub low: i32,
    pub high: i32,
}

impl EdgeThresholds {
    pub const DEFAULT: Self = Self { low: 50, high: 100 };

    pub fn new(low: i32, high: i32) -> Self {
        if low > high {
            return Self {
                low: high,
                high: low,
            };
        }
        Self { low, high }
    }
}

impl Default for EdgeThresholds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Binary edge map (0 / 255) with the source's dimensions.
///
/// Alpha is dropped before detection and never treated as signal.
pub fn extract_edges(source: &DynamicImage, thresholds: EdgeThresholds) -> GrayImage {
    let rgb = source.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }

    let gradients = Gradients::compute(&rgb);
    let candidates = suppress_non_maxima(&gradients, thresholds);
    hysteresis(&candidates, width, height)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Candidate {
    None,
    Weak,
    Strong,
}

struct Gradients {
    width: usize,
    height: usize,
    dx: Vec<i32>,
    dy: Vec<i32>,
    magnitude: Vec<i32>,
}

impl Gradients {
    fn compute(rgb: &RgbImage) -> Self {
        let width = rgb.width() as usize;
        let height = rgb.height() as usize;
        let mut dx = vec![0; width * height];
        let mut dy = vec![0; width * height];
        let mut magnitude = vec![0; width * height];
        let raw = rgb.as_raw();
        let sample = |x: isize, y: isize, channel: usize| -> i32 {
            let cx = x.clamp(0, width as isize - 1) as usize;
            let cy = y.clamp(0, height as isize - 1) as usize;
            i32::from(raw[(cy * width + cx) * 3 + channel])
        };

        for y in 0..height as isize {
            for x in 0..width as isize {
                let mut best = (0, 0, -1);
                for channel in 0..3 {
                    let gx = (sample(x + 1, y - 1, channel) - sample(x - 1, y - 1, channel))
                        + 2 * (sample(x + 1, y, channel) - sample(x - 1, y, channel))
                        + (sample(x + 1, y + 1, channel) - sample(x - 1, y + 1, channel));
                    let gy = (sample(x - 1, y + 1, channel) - sample(x - 1, y - 1, channel))
                        + 2 * (sample(x, y + 1, channel) - sample(x, y - 1, channel))
                        + (sample(x + 1, y + 1, channel) - sample(x + 1, y - 1, channel));
                    let mag = gx.abs() + gy.abs();
                    if mag > best.2 {
                        best = (gx, gy, mag);
                    }
                }
                let idx = y as usize * width + x as usize;
                dx[idx] = best.0;
                dy[idx] = best.1;
                magnitude[idx] = best.2;
            }
        }

        Self {
            width,
            height,
            dx,
            dy,
            magnitude,
        }
    }

    fn magnitude_at(&self, x: isize, y: isize) -> i32 {
        if x < 0 || y < 0 || x >= self.width as isize || y >= self.height as isize {
            return 0;
        }
        self.magnitude[y as usize * self.width + x as usize]
    }
}

// tan(22.5deg) and tan(67.5deg) in 15-bit fixed point.
const TG22: i64 = 13573;
const TG67: i64 = 79109;
const SHIFT: u32 = 15;

fn suppress_non_maxima(gradients: &Gradients, thresholds: EdgeThresholds) -> Vec<Candidate> {
    let mut candidates = vec![Candidate::None; gradients.width * gradients.height];
    for y in 0..gradients.height {
        for x in 0..gradients.width {
            let idx = y * gradients.width + x;
            let mag = gradients.magnitude[idx];
            if mag <= thresholds.low {
                continue;
            }
            let (xi, yi) = (x as isize, y as isize);
            let ax = i64::from(gradients.dx[idx].abs());
            let ay = i64::from(gradients.dy[idx].abs()) << SHIFT;

            let is_max = if ay < ax * TG22 {
                mag > gradients.magnitude_at(xi - 1, yi) && mag >= gradients.magnitude_at(xi + 1, yi)
            } else if ay > ax * TG67 {
                mag > gradients.magnitude_at(xi, yi - 1) && mag >= gradients.magnitude_at(xi, yi + 1)
            } else {
                let step = if (gradients.dx[idx] < 0) != (gradients.dy[idx] < 0) {
                    -1
                } else {
                    1
                };
                mag > gradients.magnitude_at(xi - step, yi - 1)
                    && mag > gradients.magnitude_at(xi + step, yi + 1)
            };
            if !is_max {
                continue;
            }
            candidates[idx] = if mag > thresholds.high {
                Candidate::Strong
            } else {
                Candidate::Weak
            };
        }
    }
    candidates
}

fn hysteresis(candidates: &[Candidate], width: u32, height: u32) -> GrayImage {
    let (w, h) = (width as usize, height as usize);
    let mut edges = GrayImage::new(width, height);
    let mut visited = vec![false; w * h];
    let mut stack: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| **candidate == Candidate::Strong)
        .map(|(idx, _)| idx)
        .collect();
    for &idx in &stack {
        visited[idx] = true;
    }

    while let Some(idx) = stack.pop() {
        let (x, y) = (idx % w, idx / w);
        edges.put_pixel(x as u32, y as u32, Luma([EDGE_ON]));
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let next = ny * w + nx;
                if !visited[next] && candidates[next] == Candidate::Weak {
                    visited[next] = true;
                    stack.push(next);
                }
            }
        }
    }
    edges
}
