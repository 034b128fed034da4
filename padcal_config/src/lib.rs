#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration parsing for the pad survey toolkit.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Calibration CSV loader enforces headers and performs a robust refit
//!   to reduce outlier influence before slope/intercept estimation.
use serde::Deserialize;

/// Calibration CSV schema.
///
/// Expected headers:
/// raw,kpa
///
/// Example:
/// raw,kpa
/// 120,0.0
/// 10120,100.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub raw: i64,
    pub kpa: f32,
}

/// Sensor grid dimensions in cells.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct GridCfg {
    pub width: u8,
    pub height: u8,
}

impl Default for GridCfg {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
        }
    }
}

/// A named test region on the pad; positions are jittered around its base.
#[derive(Debug, Clone, Deserialize)]
pub struct Region {
    pub id: String,
    pub x: u8,
    pub y: u8,
}

/// Position generation parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PositionsCfg {
    /// Number of jittered positions to generate per region.
    pub count: usize,
    /// Max per-axis offset from the region base, in cells.
    pub jitter: i32,
    /// Optional RNG seed for reproducible plans.
    pub seed: Option<u64>,
}

impl Default for PositionsCfg {
    fn default() -> Self {
        Self {
            count: 5,
            jitter: 3,
            seed: None,
        }
    }
}

/// Frame collection parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SamplingCfg {
    /// Frames collected per position before the cursor advances.
    pub frames_per_position: usize,
    /// Pace of automatic collection (ms between frames).
    pub frame_interval_ms: u64,
    /// Max sensor wait per read (ms). Also accepts alias "timeout_ms".
    #[serde(alias = "timeout_ms")]
    pub sensor_timeout_ms: u64,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            frames_per_position: 10,
            frame_interval_ms: 100,
            sensor_timeout_ms: 150,
        }
    }
}

/// Guide display parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct GuideCfg {
    /// Guide refresh / blink period in milliseconds.
    pub refresh_ms: u64,
}

impl Default for GuideCfg {
    fn default() -> Self {
        Self { refresh_ms: 500 }
    }
}

/// Position-CV thresholds for the sensitivity grade. A survey whose
/// position CV falls below `excellent` gets the top grade, and so on;
/// anything at or above `fair` is graded poor.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Grading {
    pub excellent: f32,
    pub good: f32,
    pub fair: f32,
}

impl Default for Grading {
    fn default() -> Self {
        Self {
            excellent: 0.05,
            good: 0.10,
            fair: 0.20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridCfg,
    /// Predefined test regions; defaults to the nine canonical regions
    /// (center, corners, edge midpoints) scaled to the grid.
    pub regions: Vec<Region>,
    pub positions: PositionsCfg,
    pub sampling: SamplingCfg,
    pub guide: GuideCfg,
    pub grading: Grading,
    pub logging: Logging,
    /// Optional persisted calibration; preferred at runtime over CSV when present.
    pub calibration: Option<PersistedCalibration>,
}

impl Default for Config {
    fn default() -> Self {
        let grid = GridCfg::default();
        Self {
            grid,
            regions: default_regions(grid),
            positions: PositionsCfg::default(),
            sampling: SamplingCfg::default(),
            guide: GuideCfg::default(),
            grading: Grading::default(),
            logging: Logging::default(),
            calibration: None,
        }
    }
}

/// The nine canonical regions: center, four corners, four edge midpoints.
/// Corner/edge bases are inset by an eighth of the grid so the jitter box
/// stays on the pad.
pub fn default_regions(grid: GridCfg) -> Vec<Region> {
    let w = grid.width.max(2);
    let h = grid.height.max(2);
    let (cx, cy) = (w / 2, h / 2);
    let (lo_x, lo_y) = (w / 8, h / 8);
    let (hi_x, hi_y) = (w - 1 - w / 8, h - 1 - h / 8);
    let mk = |id: &str, x: u8, y: u8| Region {
        id: id.to_string(),
        x,
        y,
    };
    vec![
        mk("center", cx, cy),
        mk("top-left", lo_x, lo_y),
        mk("top-right", hi_x, lo_y),
        mk("bottom-left", lo_x, hi_y),
        mk("bottom-right", hi_x, hi_y),
        mk("top", cx, lo_y),
        mk("bottom", cx, hi_y),
        mk("left", lo_x, cy),
        mk("right", hi_x, cy),
    ]
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PersistedCalibration {
    /// pressure units per raw count
    pub gain_kpa_per_count: f32,
    /// zero-load baseline in raw counts
    pub zero_counts: i32,
    /// additive offset in kPa (rarely needed; default 0.0)
    #[serde(default)]
    pub offset_kpa: f32,
}

impl From<PersistedCalibration> for Calibration {
    fn from(p: PersistedCalibration) -> Self {
        Calibration {
            gain_kpa_per_count: p.gain_kpa_per_count,
            zero_counts: p.zero_counts,
            offset_kpa: p.offset_kpa,
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Grid
        if self.grid.width < 2 || self.grid.height < 2 {
            eyre::bail!("grid must be at least 2x2");
        }

        // Regions
        if self.regions.is_empty() {
            eyre::bail!("at least one region must be defined");
        }
        for r in &self.regions {
            if r.id.trim().is_empty() {
                eyre::bail!("region id must not be empty");
            }
            if r.x >= self.grid.width || r.y >= self.grid.height {
                eyre::bail!(
                    "region '{}' base ({}, {}) lies outside the {}x{} grid",
                    r.id,
                    r.x,
                    r.y,
                    self.grid.width,
                    self.grid.height
                );
            }
        }

        // Positions
        if self.positions.count == 0 {
            eyre::bail!("positions.count must be >= 1");
        }
        if self.positions.jitter <= 0 {
            eyre::bail!("positions.jitter must be > 0");
        }

        // Sampling
        if self.sampling.frames_per_position == 0 {
            eyre::bail!("sampling.frames_per_position must be >= 1");
        }
        if self.sampling.frame_interval_ms == 0 {
            eyre::bail!("sampling.frame_interval_ms must be >= 1");
        }
        if self.sampling.sensor_timeout_ms == 0 {
            eyre::bail!("sampling.sensor_timeout_ms must be >= 1");
        }

        // Guide
        if self.guide.refresh_ms == 0 {
            eyre::bail!("guide.refresh_ms must be >= 1");
        }
        if self.guide.refresh_ms > 60_000 {
            eyre::bail!("guide.refresh_ms is unreasonably large (>60s)");
        }

        // Grading thresholds must be strictly increasing and in (0, 1]
        let g = &self.grading;
        for (name, v) in [
            ("excellent", g.excellent),
            ("good", g.good),
            ("fair", g.fair),
        ] {
            if !(v > 0.0 && v <= 1.0) {
                eyre::bail!("grading.{name} must be in (0.0, 1.0]");
            }
        }
        if !(g.excellent < g.good && g.good < g.fair) {
            eyre::bail!("grading thresholds must satisfy excellent < good < fair");
        }

        // Calibration (when persisted inline)
        if let Some(c) = &self.calibration {
            if !c.gain_kpa_per_count.is_finite() || c.gain_kpa_per_count == 0.0 {
                eyre::bail!("calibration.gain_kpa_per_count must be finite and non-zero");
            }
            if !c.offset_kpa.is_finite() {
                eyre::bail!("calibration.offset_kpa must be finite");
            }
        }

        Ok(())
    }

    /// Look up a region by id (case-sensitive).
    pub fn region(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }
}

/// Linear calibration from raw sensor counts to pressure units.
/// kpa = gain_kpa_per_count * (raw - zero_counts) + offset_kpa
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub gain_kpa_per_count: f32,
    pub zero_counts: i32,
    pub offset_kpa: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            gain_kpa_per_count: 0.01, // 1 count = 0.01 kPa, matches sim
            zero_counts: 0,
            offset_kpa: 0.0,
        }
    }
}

impl Calibration {
    pub fn to_kpa(&self, raw: i32) -> f32 {
        self.gain_kpa_per_count * ((raw.saturating_sub(self.zero_counts)) as f32) + self.offset_kpa
    }

    /// Build Calibration from calibration rows using ordinary least squares on all points.
    /// Fits kpa = a*raw + b, then converts to the runtime form
    /// kpa = a*(raw - zero_counts), where zero_counts = round(-b/a) is the
    /// zero-load baseline in raw counts.
    pub fn from_rows(rows: Vec<CalibrationRow>) -> eyre::Result<Self> {
        if rows.len() < 2 {
            eyre::bail!("calibration requires at least two rows, got {}", rows.len());
        }

        // Ensure strictly monotonic raw values (increasing or decreasing), no duplicates
        let mut dir: i8 = 0; // 1 for increasing, -1 for decreasing
        for i in 1..rows.len() {
            let d = rows[i].raw - rows[i - 1].raw;
            if d == 0 {
                eyre::bail!(
                    "calibration rows have duplicate raw values at index {} and {}",
                    i - 1,
                    i
                );
            }
            let step_dir = if d > 0 { 1 } else { -1 };
            if dir == 0 {
                dir = step_dir;
            } else if dir != step_dir {
                eyre::bail!(
                    "calibration raw values must be monotonic (strictly increasing or strictly decreasing)"
                );
            }
        }

        // Closure: OLS fit in f64 for numerical stability
        let fit = |pts: &[(i64, f32)]| -> eyre::Result<(f64, f64)> {
            let n = pts.len() as f64;
            let sum_x: f64 = pts.iter().map(|r| r.0 as f64).sum();
            let sum_y: f64 = pts.iter().map(|r| r.1 as f64).sum();
            let mean_x = sum_x / n;
            let mean_y = sum_y / n;
            let mut sxx = 0.0f64;
            let mut sxy = 0.0f64;
            for (rx, py) in pts {
                let x = *rx as f64 - mean_x;
                let y = *py as f64 - mean_y;
                sxx += x * x;
                sxy += x * y;
            }
            if !sxx.is_finite() || sxx == 0.0 {
                eyre::bail!("calibration cannot determine slope (degenerate X variance)");
            }
            let a = sxy / sxx;
            if !a.is_finite() {
                eyre::bail!("calibration produced non-finite slope");
            }
            if a == 0.0 {
                eyre::bail!("calibration produced zero slope (invalid gain)");
            }
            let b = mean_y - a * mean_x;
            Ok((a, b))
        };

        // Initial fit
        let pts: Vec<(i64, f32)> = rows.iter().map(|r| (r.raw, r.kpa)).collect();
        let (a0, b0) = fit(&pts)?;
        // Compute robust sigma estimate (RMS of residuals) without allocating residuals
        let mut sumsq: f64 = 0.0;
        for (x, y) in &pts {
            let r = (*y as f64) - (a0 * (*x as f64) + b0);
            sumsq += r * r;
        }
        let n_pts = pts.len();
        let rms = if n_pts == 0 {
            0.0
        } else {
            (sumsq / (n_pts as f64)).sqrt()
        };

        // Reject outliers with |residual| > 2 sigma and refit if at least 2 remain.
        let (a, b) = robust_refit(&pts, a0, b0, rms, 2.0).unwrap_or((a0, b0));

        // Convert to runtime representation: kpa = a * (raw - zero_counts)
        let zero = if a == 0.0 {
            eyre::bail!("calibration slope is zero, cannot compute baseline");
        } else {
            -b / a // where kpa == 0
        };
        if !zero.is_finite() {
            eyre::bail!("calibration produced invalid zero baseline");
        }
        let zero_counts = zero.round() as i32;

        Ok(Calibration {
            gain_kpa_per_count: a as f32,
            zero_counts,
            offset_kpa: 0.0,
        })
    }
}

/// Perform a single-step robust refit by rejecting outliers defined by |residual| > k * rms
/// around the initial line y = a0*x + b0. Uses an online (Welford/Chan) covariance update
/// over inliers only to compute slope and intercept. Returns None when refit is not applicable
/// (e.g., non-finite/zero rms, <2 inliers, or degenerate variance), in which case the caller
/// should keep the original (a0, b0).
fn robust_refit(pts: &[(i64, f32)], a0: f64, b0: f64, rms: f64, k: f64) -> Option<(f64, f64)> {
    if !(rms.is_finite() && rms > 0.0 && k.is_finite() && k > 0.0) {
        return None;
    }
    let n_pts = pts.len();
    if n_pts < 2 {
        return None;
    }

    let thr = k * rms;
    // Online means and covariance accumulators for inliers
    let mut n_in: usize = 0;
    let mut mean_x = 0.0f64;
    let mut mean_y = 0.0f64;
    let mut cxx = 0.0f64;
    let mut cxy = 0.0f64;

    for (x_i, y_i) in pts.iter() {
        let x = *x_i as f64;
        let y = *y_i as f64;
        let r = y - (a0 * x + b0);
        if r.abs() <= thr {
            // Inlier: update online means and covariances
            n_in += 1;
            let n_new = n_in as f64;
            let dx = x - mean_x;
            let dy = y - mean_y;
            let mean_x_new = mean_x + dx / n_new;
            let mean_y_new = mean_y + dy / n_new;
            // Chan's update for covariance terms
            cxx += dx * (x - mean_x_new);
            cxy += dx * (y - mean_y_new);
            mean_x = mean_x_new;
            mean_y = mean_y_new;
        }
    }

    if n_in >= 2 && n_in < n_pts {
        if !(cxx.is_finite()) || cxx == 0.0 {
            return None;
        }
        let a = cxy / cxx;
        if !a.is_finite() || a == 0.0 {
            return None;
        }
        let b = mean_y - a * mean_x;
        Some((a, b))
    } else {
        None
    }
}

// Ergonomic conversions for building Calibration
impl TryFrom<Vec<CalibrationRow>> for Calibration {
    type Error = eyre::Report;
    fn try_from(rows: Vec<CalibrationRow>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl TryFrom<&[CalibrationRow]> for Calibration {
    type Error = eyre::Report;
    fn try_from(rows: &[CalibrationRow]) -> Result<Self, Self::Error> {
        Self::from_rows(rows.to_vec())
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<Calibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["raw", "kpa"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'raw,kpa', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    Calibration::try_from(rows)
}
