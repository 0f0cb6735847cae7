//! Level grid generators for building predictable pixel payloads.

/// Creates a row-major level grid with a diagonal storm band.
///
/// Cell `(row, col)` gets level `(row + col) % 7`, so every level 0..=6
/// appears once the grid is at least 4x4.
///
/// # Example
///
/// ```
/// use test_utils::create_level_grid;
///
/// let grid = create_level_grid(3, 4);
/// assert_eq!(grid.len(), 12);
/// assert_eq!(grid[0], 0);
/// assert_eq!(grid[5], 2); // row 1, col 1
/// ```
pub fn create_level_grid(rows: usize, cols: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            data.push(((row + col) % 7) as u8);
        }
    }
    data
}

/// Creates a mostly empty grid with one rectangular cell of `level`.
pub fn create_cell_grid(
    rows: usize,
    cols: usize,
    level: u8,
    row_range: std::ops::Range<usize>,
    col_range: std::ops::Range<usize>,
) -> Vec<u8> {
    let mut data = vec![0u8; rows * cols];
    for row in row_range {
        for col in col_range.clone() {
            if row < rows && col < cols {
                data[row * cols + col] = level;
            }
        }
    }
    data
}

/// Encodes raw values as ITWS `value,count` run-length text.
///
/// # Example
///
/// ```
/// use test_utils::rle_from_levels;
///
/// assert_eq!(rle_from_levels(&[0, 0, 0, 2, 2, 0]), "0,3 2,2 0,1");
/// ```
pub fn rle_from_levels(levels: &[u8]) -> String {
    let mut out = String::new();
    let mut iter = levels.iter().peekable();
    while let Some(&value) = iter.next() {
        let mut count = 1;
        while iter.peek() == Some(&&value) {
            iter.next();
            count += 1;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&format!("{},{}", value, count));
    }
    out
}
