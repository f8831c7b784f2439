//! Gesture canonicalization and strength analysis
//!
//! A gesture arrives from the UI as an ordered sequence of distinct cell
//! indices over an N-by-N grid. `canonicalize` turns it into the stable byte
//! sequence fed to the KDF; the encoding incorporates the grid size, so the
//! same path drawn on a 4x4 and a 5x5 grid derives different keys.
//!
//! `analyze` and `classify_weak` feed UX strength feedback only. The storage
//! layer never consults them: any sequence of indices can derive a key.

use serde::{Deserialize, Serialize};

use nightjar_core::{VaultError, VaultResult};

/// Encoding version byte; bump if the canonical layout ever changes.
const CANONICAL_VERSION: u8 = 1;

/// Strength metrics for UX feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureMetrics {
    pub node_count: usize,
    pub direction_changes: usize,
    pub starts_at_corner: bool,
    pub ends_at_corner: bool,
    pub crosses_center: bool,
    pub touches_all_quadrants: bool,
    /// Weighted 0-100 score for strength meters
    pub complexity_score: u32,
}

/// Canonicalize a gesture into the byte sequence used for key derivation.
///
/// Layout: `[version][grid_size][2 bytes BE: cell count][2 bytes BE per cell]`.
/// Deterministic for a given (cells, grid_size) pair.
pub fn canonicalize(cells: &[u16], grid_size: u8) -> VaultResult<Vec<u8>> {
    validate(cells, grid_size)?;

    let mut out = Vec::with_capacity(4 + cells.len() * 2);
    out.push(CANONICAL_VERSION);
    out.push(grid_size);
    out.extend_from_slice(&(cells.len() as u16).to_be_bytes());
    for cell in cells {
        out.extend_from_slice(&cell.to_be_bytes());
    }
    Ok(out)
}

/// Compute strength metrics for a gesture.
pub fn analyze(cells: &[u16], grid_size: u8) -> VaultResult<GestureMetrics> {
    validate(cells, grid_size)?;

    let n = grid_size as u16;
    let corners = [0, n - 1, n * (n - 1), n * n - 1];
    let dirs = segment_directions(cells, n);
    let direction_changes = dirs.windows(2).filter(|w| w[0] != w[1]).count();

    let quadrants: std::collections::HashSet<u8> =
        cells.iter().map(|&c| quadrant(c, n)).collect();

    let metrics = GestureMetrics {
        node_count: cells.len(),
        direction_changes,
        starts_at_corner: corners.contains(&cells[0]),
        ends_at_corner: corners.contains(&cells[cells.len() - 1]),
        crosses_center: cells.iter().any(|&c| is_center(c, n)),
        touches_all_quadrants: quadrants.len() == 4,
        complexity_score: 0,
    };

    let mut score = (metrics.node_count as u32 * 8).min(40)
        + (metrics.direction_changes as u32 * 10).min(30);
    if metrics.touches_all_quadrants {
        score += 15;
    }
    if metrics.crosses_center {
        score += 5;
    }
    if !metrics.starts_at_corner {
        score += 5;
    }
    if !metrics.ends_at_corner {
        score += 5;
    }

    Ok(GestureMetrics {
        complexity_score: score.min(100),
        ..metrics
    })
}

/// Heuristic check for well-known weak shapes: straight lines, L-shapes,
/// Z-shapes, edge-hugging paths, and strictly sequential index runs.
///
/// Advisory only. A weak gesture still derives a key and still unlocks a
/// vault; the UI decides whether to warn.
pub fn classify_weak(cells: &[u16], grid_size: u8) -> VaultResult<bool> {
    validate(cells, grid_size)?;

    let n = grid_size as u16;

    // Strictly sequential index run, ascending or descending
    if cells.len() >= 2 {
        let ascending = cells.windows(2).all(|w| w[1] == w[0].wrapping_add(1));
        let descending = cells.windows(2).all(|w| w[0] == w[1].wrapping_add(1));
        if ascending || descending {
            return Ok(true);
        }
    }

    let dirs = segment_directions(cells, n);
    let changes = dirs.windows(2).filter(|w| w[0] != w[1]).count();

    // Straight line or single bend (L-shape)
    if changes <= 1 {
        return Ok(true);
    }

    // Z-shape: exactly two bends with parallel first and last strokes
    if changes == 2 && dirs.first() == dirs.last() {
        return Ok(true);
    }

    // Edge-hugging: the whole path stays on the grid perimeter
    let on_perimeter = |c: u16| {
        let (row, col) = (c / n, c % n);
        row == 0 || row == n - 1 || col == 0 || col == n - 1
    };
    if cells.iter().all(|&c| on_perimeter(c)) {
        return Ok(true);
    }

    Ok(false)
}

/// Advisory creation guideline: at least 6 nodes and 2 direction changes.
pub fn meets_creation_guidelines(cells: &[u16], grid_size: u8) -> VaultResult<bool> {
    let metrics = analyze(cells, grid_size)?;
    Ok(metrics.node_count >= 6 && metrics.direction_changes >= 2)
}

fn validate(cells: &[u16], grid_size: u8) -> VaultResult<()> {
    if grid_size < 2 {
        return Err(VaultError::InvalidInput(format!(
            "grid size {grid_size} too small"
        )));
    }
    if cells.is_empty() {
        return Err(VaultError::InvalidInput("empty gesture".into()));
    }

    let cell_count = grid_size as u16 * grid_size as u16;
    let mut seen = vec![false; cell_count as usize];
    for &cell in cells {
        if cell >= cell_count {
            return Err(VaultError::InvalidInput(format!(
                "cell {cell} outside {grid_size}x{grid_size} grid"
            )));
        }
        if seen[cell as usize] {
            return Err(VaultError::InvalidInput(format!("cell {cell} repeated")));
        }
        seen[cell as usize] = true;
    }
    Ok(())
}

/// Normalized direction of each consecutive segment.
fn segment_directions(cells: &[u16], n: u16) -> Vec<(i32, i32)> {
    cells
        .windows(2)
        .map(|w| {
            let (r0, c0) = ((w[0] / n) as i32, (w[0] % n) as i32);
            let (r1, c1) = ((w[1] / n) as i32, (w[1] % n) as i32);
            let (dr, dc) = (r1 - r0, c1 - c0);
            let g = gcd(dr.unsigned_abs(), dc.unsigned_abs()).max(1) as i32;
            (dr / g, dc / g)
        })
        .collect()
}

fn quadrant(cell: u16, n: u16) -> u8 {
    let (row, col) = (cell / n, cell % n);
    let top = row * 2 < n;
    let left = col * 2 < n;
    (u8::from(!top) << 1) | u8::from(!left)
}

fn is_center(cell: u16, n: u16) -> bool {
    let (row, col) = (cell / n, cell % n);
    let mid = |x: u16| {
        if n % 2 == 1 {
            x == n / 2
        } else {
            x == n / 2 || x == n / 2 - 1
        }
    };
    mid(row) && mid(col)
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}
