//! Connected-component labelling on a sampling grid.

use std::collections::VecDeque;

use super::Connectivity;

/// One maximal group of connected, equal-valued cells.
#[derive(Debug, Clone)]
pub(crate) struct Component {
    pub value: f32,
    /// Row-major cell indices.
    pub cells: Vec<usize>,
}

/// Component id of every cell (`None` = masked) plus the components.
#[derive(Debug, Clone)]
pub(crate) struct Labelling {
    pub cols: usize,
    pub rows: usize,
    pub labels: Vec<Option<usize>>,
    pub components: Vec<Component>,
}

impl Labelling {
    /// Component id at `(col, row)`; out-of-grid cells belong to no component.
    pub(crate) fn label_at(&self, col: i64, row: i64) -> Option<usize> {
        if col < 0 || row < 0 || col >= self.cols as i64 || row >= self.rows as i64 {
            return None;
        }
        self.labels[row as usize * self.cols + col as usize]
    }
}

/// Breadth-first labelling of `values` (row-major, `None` = masked).
/// Components are numbered in scan order of their first cell.
pub(crate) fn label_components(
    values: &[Option<f32>],
    cols: usize,
    rows: usize,
    connectivity: Connectivity,
) -> Labelling {
    let mut labels: Vec<Option<usize>> = vec![None; values.len()];
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..values.len() {
        let Some(value) = values[start] else { continue };
        if labels[start].is_some() {
            continue;
        }
        let id = components.len();
        labels[start] = Some(id);
        queue.push_back(start);
        let mut cells = Vec::new();

        while let Some(idx) = queue.pop_front() {
            cells.push(idx);
            let (row, col) = ((idx / cols) as i64, (idx % cols) as i64);
            for &(dc, dr) in connectivity.offsets() {
                let (nc, nr) = (col + dc, row + dr);
                if nc < 0 || nr < 0 || nc >= cols as i64 || nr >= rows as i64 {
                    continue;
                }
                let n = nr as usize * cols + nc as usize;
                if labels[n].is_none() && values[n] == Some(value) {
                    labels[n] = Some(id);
                    queue.push_back(n);
                }
            }
        }
        cells.sort_unstable();
        components.push(Component { value, cells });
    }

    Labelling { cols, rows, labels, components }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse a picture, top line = northernmost row; `.` = masked, digits = values.
    fn grid(picture: &[&str]) -> (Vec<Option<f32>>, usize, usize) {
        let rows = picture.len();
        let cols = picture[0].len();
        let mut values = vec![None; rows * cols];
        for (i, line) in picture.iter().enumerate() {
            let row = rows - 1 - i;
            for (col, ch) in line.chars().enumerate() {
                values[row * cols + col] = ch.to_digit(10).map(|d| d as f32);
            }
        }
        (values, cols, rows)
    }

    #[test]
    fn diagonal_cells_depend_on_connectivity() {
        let (v, c, r) = grid(&["1.", ".1"]);
        assert_eq!(label_components(&v, c, r, Connectivity::Four).components.len(), 2);
        assert_eq!(label_components(&v, c, r, Connectivity::Eight).components.len(), 1);
    }

    #[test]
    fn different_values_are_separate_components() {
        let (v, c, r) = grid(&["1122", "1122"]);
        let lab = label_components(&v, c, r, Connectivity::Eight);
        assert_eq!(lab.components.len(), 2);
        assert!(lab.components.iter().all(|comp| comp.cells.len() == 4));
    }

    #[test]
    fn label_at_outside_grid_is_none() {
        let (v, c, r) = grid(&["1"]);
        let lab = label_components(&v, c, r, Connectivity::Four);
        assert_eq!(lab.label_at(0, 0), Some(0));
        assert_eq!(lab.label_at(-1, 0), None);
        assert_eq!(lab.label_at(0, 1), None);
    }
}
