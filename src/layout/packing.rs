//! Row packing for the device wall
//!
//! Items are packed greedily into rows for a range of candidate row widths;
//! the candidate that can be displayed at the largest scale inside the
//! viewport wins.

use serde::Serialize;

/// Width and height of an item or a packed area, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// One packed row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    /// Indices into the input item list, left to right
    pub items: Vec<usize>,
    pub width: f64,
    pub height: f64,
}

/// A complete packing for one candidate row width
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WallLayout {
    pub rows: Vec<Row>,
    pub width: f64,
    pub height: f64,
    pub max_items_per_row: usize,
    /// Row width limit this layout was packed against
    pub max_row_width: f64,
}

impl WallLayout {
    /// Largest scale at which the whole layout fits in `viewport`
    pub fn max_scale(&self, viewport: Size) -> f64 {
        (viewport.width / self.width).min(viewport.height / self.height)
    }

    /// Zoom floor for the pannable layer, never above 1
    pub fn min_zoom(&self, viewport: Size) -> f64 {
        self.max_scale(viewport).min(1.0)
    }

    /// Top-left corner of every item, in input order
    pub fn positions(&self, items: &[Size]) -> Vec<(f64, f64)> {
        let mut positions = vec![(0.0, 0.0); items.len()];
        let mut y = 0.0;
        for row in &self.rows {
            let mut x = 0.0;
            for &idx in &row.items {
                positions[idx] = (x, y);
                x += items[idx].width;
            }
            y += row.height;
        }
        positions
    }
}

/// Greedy left-to-right packing against a fixed row width limit
pub fn pack_rows(items: &[Size], max_row_width: f64) -> WallLayout {
    let mut rows: Vec<Vec<usize>> = vec![Vec::new()];
    let mut row_width = 0.0;
    for (idx, item) in items.iter().enumerate() {
        if row_width + item.width > max_row_width {
            rows.push(Vec::new());
            row_width = 0.0;
        }
        row_width += item.width;
        if let Some(row) = rows.last_mut() {
            row.push(idx);
        }
    }

    let rows: Vec<Row> = rows
        .into_iter()
        .filter(|row| !row.is_empty())
        .map(|row| Row {
            width: row.iter().map(|&i| items[i].width).sum(),
            height: row.iter().map(|&i| items[i].height).fold(0.0, f64::max),
            items: row,
        })
        .collect();

    WallLayout {
        width: rows.iter().map(|r| r.width).fold(0.0, f64::max),
        height: rows.iter().map(|r| r.height).sum(),
        max_items_per_row: rows.iter().map(|r| r.items.len()).max().unwrap_or(0),
        max_row_width,
        rows,
    }
}

/// Try `n + 1` row widths between the widest item and the total width and
/// keep the packing that fits `viewport` at the largest scale. Ties keep the
/// narrower candidate. Returns `None` for an empty item list.
pub fn calculate_optimal_wall_size(items: &[Size], viewport: Size) -> Option<WallLayout> {
    if items.is_empty() {
        return None;
    }
    let overall_width: f64 = items.iter().map(|s| s.width).sum();
    let max_item_width = items.iter().map(|s| s.width).fold(0.0, f64::max);
    let delta = overall_width - max_item_width;
    let attempts = items.len();

    let mut best: Option<(f64, WallLayout)> = None;
    for i in 0..=attempts {
        let candidate = max_item_width + delta * (i as f64 / attempts as f64);
        let layout = pack_rows(items, candidate);
        let scale = layout.max_scale(viewport);
        match &best {
            Some((best_scale, _)) if *best_scale >= scale => {}
            _ => best = Some((scale, layout)),
        }
    }
    best.map(|(_, layout)| layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_item_lands_in_one_row_within_limit() {
        let items = [
            Size::new(340.0, 520.0),
            Size::new(400.0, 700.0),
            Size::new(800.0, 1000.0),
            Size::new(1200.0, 900.0),
        ];
        for limit in [1200.0, 1600.0, 2740.0] {
            let layout = pack_rows(&items, limit);
            let mut seen: Vec<usize> = layout.rows.iter().flat_map(|r| r.items.clone()).collect();
            seen.sort();
            assert_eq!(seen, vec![0, 1, 2, 3]);
            for row in &layout.rows {
                assert!(row.width <= limit);
            }
        }
    }

    #[test]
    fn test_oversized_item_gets_its_own_row() {
        let items = [Size::new(500.0, 100.0), Size::new(300.0, 100.0)];
        let layout = pack_rows(&items, 400.0);
        assert_eq!(layout.rows.len(), 2);
        assert_eq!(layout.width, 500.0);
        assert_eq!(layout.height, 200.0);
    }

    #[test]
    fn test_wide_viewport_prefers_single_row() {
        let items = vec![Size::new(100.0, 100.0); 4];
        let wide = calculate_optimal_wall_size(&items, Size::new(4000.0, 1000.0)).unwrap();
        assert_eq!(wide.rows.len(), 1);

        let square = calculate_optimal_wall_size(&items, Size::new(1000.0, 1000.0)).unwrap();
        assert_eq!(square.rows.len(), 2);
        assert_eq!(square.max_items_per_row, 2);
    }

    #[test]
    fn test_empty_input_has_no_layout() {
        assert!(calculate_optimal_wall_size(&[], Size::new(800.0, 600.0)).is_none());
    }

    #[test]
    fn test_positions_follow_rows() {
        let items = vec![Size::new(100.0, 50.0); 3];
        let layout = pack_rows(&items, 200.0);
        assert_eq!(
            layout.positions(&items),
            vec![(0.0, 0.0), (100.0, 0.0), (0.0, 50.0)]
        );
    }

    #[test]
    fn test_chosen_layout_has_the_largest_scale_of_all_candidates() {
        let mixed = vec![
            Size::new(415.0, 707.0),
            Size::new(452.0, 955.0),
            Size::new(808.0, 1064.0),
            Size::new(1064.0, 808.0),
            Size::new(360.0, 780.0),
        ];
        let equal = vec![Size::new(340.0, 540.0); 6];
        let viewports = [
            Size::new(1200.0, 900.0),
            Size::new(2400.0, 600.0),
            Size::new(600.0, 2400.0),
            Size::new(1000.0, 1000.0),
        ];

        for items in [&mixed, &equal] {
            let overall: f64 = items.iter().map(|s| s.width).sum();
            let widest = items.iter().map(|s| s.width).fold(0.0, f64::max);
            let n = items.len();
            let candidates: Vec<WallLayout> = (0..=n)
                .map(|i| pack_rows(items, widest + (overall - widest) * (i as f64 / n as f64)))
                .collect();

            for viewport in viewports {
                let chosen = calculate_optimal_wall_size(items, viewport).unwrap();
                let best = candidates
                    .iter()
                    .map(|c| c.max_scale(viewport))
                    .fold(f64::MIN, f64::max);
                assert_eq!(chosen.max_scale(viewport), best);

                // ties go to the first candidate reaching the best scale
                let first = candidates
                    .iter()
                    .find(|c| c.max_scale(viewport) == best)
                    .unwrap();
                assert_eq!(&chosen, first);
            }
        }
    }
}
