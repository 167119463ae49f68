//! Table-grid reconstruction.
//!
//! Header rows come first, then body rows, each in source order. Cells are
//! kept sequentially with their spans as metadata; nothing is re-sorted by
//! row or column indices that may appear in the source. A span-aware
//! coordinate view is available through [`TableData::occupancy_grid`] for
//! callers that need one.

use super::text::{resolve, FullText};
use crate::model::{Block, Payload, TableBlock, TableCell, TableCellData, TableData};

/// Build the grid for a table block.
pub fn build_grid(table: &TableBlock, text: &FullText) -> TableData {
    let structured_rows: Vec<Vec<TableCellData>> = table
        .header_rows
        .iter()
        .chain(&table.body_rows)
        .map(|row| row.cells.iter().map(|cell| cell_data(cell, text)).collect())
        .collect();

    let simple_matrix = structured_rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.text.clone()).collect())
        .collect();

    TableData {
        structured_rows,
        simple_matrix,
    }
}

fn cell_data(cell: &TableCell, text: &FullText) -> TableCellData {
    let anchor = cell.layout.as_ref().and_then(|l| l.text_anchor.as_ref());
    let mut content = resolve(anchor, text);
    if content.is_empty() && !cell.blocks.is_empty() {
        content = nested_text(&cell.blocks, text);
    }
    TableCellData {
        text: content,
        row_span: span(cell.row_span),
        col_span: span(cell.col_span),
    }
}

/// Text of blocks nested inside a cell, joined by single spaces.
fn nested_text(blocks: &[Block], text: &FullText) -> String {
    blocks
        .iter()
        .filter_map(|block| {
            let anchored = resolve(block.layout.text_anchor.as_ref(), text);
            if !anchored.is_empty() {
                return Some(anchored);
            }
            match &block.payload {
                Payload::Text(t) | Payload::List { text: Some(t), .. } => {
                    let inline = t.text.as_deref().unwrap_or("").trim();
                    if inline.is_empty() {
                        let nested = nested_text(&t.blocks, text);
                        (!nested.is_empty()).then_some(nested)
                    } else {
                        Some(inline.to_string())
                    }
                }
                _ => None,
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spans default to 1 when missing or non-positive.
fn span(raw: Option<i64>) -> u32 {
    raw.filter(|&s| s >= 1)
        .map(|s| u32::try_from(s).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

// ── Derived views ────────────────────────────────────────────────────────────

/// One position of the span-aware coordinate grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot<'a> {
    /// Top-left position of a cell.
    Cell(&'a TableCellData),
    /// Covered by the span of the cell whose origin is `(row, col)`.
    Spanned { row: usize, col: usize },
    /// Nothing was placed here (short rows).
    Empty,
}

impl TableData {
    pub fn row_count(&self) -> usize {
        self.simple_matrix.len()
    }

    /// Widest row, in cells.
    pub fn column_count(&self) -> usize {
        self.simple_matrix.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Place every cell at its spanned coordinates.
    ///
    /// Cells fill the first free column of their row, left to right. Row
    /// spans are clipped to the table's row count and column spans to
    /// [`Self::span_width`]. All rows of the result have the same width.
    pub fn occupancy_grid(&self) -> Vec<Vec<Slot<'_>>> {
        let rows = self.structured_rows.len();
        let width_cap = self.span_width();
        let mut grid: Vec<Vec<Slot<'_>>> = vec![Vec::new(); rows];

        for (r, row) in self.structured_rows.iter().enumerate() {
            let mut c: usize = 0;
            for cell in row {
                while matches!(grid[r].get(c), Some(slot) if *slot != Slot::Empty) {
                    c += 1;
                }
                let row_end = r.saturating_add(cell.row_span as usize).min(rows);
                let col_end = c
                    .saturating_add(cell.col_span as usize)
                    .min(width_cap)
                    .max(c + 1);
                for (rr, grid_row) in grid.iter_mut().enumerate().take(row_end).skip(r) {
                    if grid_row.len() < col_end {
                        grid_row.resize(col_end, Slot::Empty);
                    }
                    for (cc, slot) in grid_row.iter_mut().enumerate().take(col_end).skip(c) {
                        *slot = if rr == r && cc == c {
                            Slot::Cell(cell)
                        } else {
                            Slot::Spanned { row: r, col: c }
                        };
                    }
                }
                c = col_end;
            }
        }

        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut grid {
            row.resize(width, Slot::Empty);
        }
        grid
    }

    /// Widest row measured in columns, counting each span as at most the
    /// widest row's cell count.
    pub fn span_width(&self) -> usize {
        let widest = self
            .structured_rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        self.structured_rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| (cell.col_span as usize).min(widest))
                    .sum::<usize>()
            })
            .max()
            .unwrap_or(0)
    }

    /// Render `simple_matrix` as a GFM table; the first row is the header.
    ///
    /// Rows are padded (or truncated) to the header width. Pipes inside
    /// cells are escaped and line breaks flattened. Returns `""` for an
    /// empty table.
    pub fn to_markdown(&self) -> String {
        let Some(header) = self.simple_matrix.first() else {
            return String::new();
        };
        let width = header.len().max(1);

        let render_row = |row: &[String]| {
            let cells: Vec<String> = (0..width)
                .map(|i| row.get(i).map(|c| escape_cell(c)).unwrap_or_default())
                .collect();
            format!("| {} |", cells.join(" | "))
        };

        let mut lines = Vec::with_capacity(self.simple_matrix.len() + 1);
        lines.push(render_row(header));
        lines.push(format!("| {} |", vec!["---"; width].join(" | ")));
        lines.extend(self.simple_matrix[1..].iter().map(|row| render_row(row)));
        lines.join("\n")
    }
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Coarse table category, used to pick narrative instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Comparison,
    TimeSeries,
    Summary,
    Data,
}

const TIME_KEYWORDS: [&str; 10] = [
    "year", "month", "quarter", "date", "time", "period", "q1", "q2", "q3", "q4",
];
const SUMMARY_KEYWORDS: [&str; 5] = ["total", "sum", "average", "mean", "summary"];

impl TableKind {
    /// Heuristic classification of a text matrix.
    ///
    /// Checked in order: time keywords in the first column, more than two
    /// columns in the first row, summary keywords anywhere. Tables with
    /// fewer than two rows are plain data.
    pub fn detect(matrix: &[Vec<String>]) -> Self {
        if matrix.len() < 2 {
            return TableKind::Data;
        }

        let first_column = matrix
            .iter()
            .map(|row| row.first().map(|c| c.to_lowercase()).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" ");
        if TIME_KEYWORDS.iter().any(|k| first_column.contains(k)) {
            return TableKind::TimeSeries;
        }

        if matrix[0].len() > 2 {
            return TableKind::Comparison;
        }

        let all_text = matrix
            .iter()
            .map(|row| row.join(" "))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if SUMMARY_KEYWORDS.iter().any(|k| all_text.contains(k)) {
            return TableKind::Summary;
        }

        TableKind::Data
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Comparison => "comparison",
            TableKind::TimeSeries => "time-series",
            TableKind::Summary => "summary",
            TableKind::Data => "data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(value: serde_json::Value) -> TableBlock {
        serde_json::from_value(value).expect("table decodes")
    }

    fn cell(start: i64, end: i64) -> serde_json::Value {
        json!({"layout": {"textAnchor": {"textSegments": [{"startIndex": start, "endIndex": end}]}}})
    }

    fn matrix(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn header_rows_precede_body_rows() {
        let text = FullText::new("H1 H2 b1 b2");
        let t = table(json!({
            "bodyRows": [{"cells": [cell(6, 8), cell(9, 11)]}],
            "headerRows": [{"cells": [cell(0, 2), cell(3, 5)]}]
        }));
        let grid = build_grid(&t, &text);
        assert_eq!(grid.simple_matrix, matrix(&[&["H1", "H2"], &["b1", "b2"]]));
    }

    #[test]
    fn row_index_metadata_does_not_reorder() {
        let text = FullText::new("head body");
        let t = table(json!({
            "headerRows": [{"cells": [{"layout": {
                "tableRowIndex": 5,
                "textAnchor": {"textSegments": [{"endIndex": 4}]}
            }}]}],
            "bodyRows": [{"cells": [{"layout": {
                "tableRowIndex": 0,
                "textAnchor": {"textSegments": [{"startIndex": 5, "endIndex": 9}]}
            }}]}]
        }));
        let grid = build_grid(&t, &text);
        assert_eq!(grid.simple_matrix, matrix(&[&["head"], &["body"]]));
    }

    #[test]
    fn spans_default_to_one() {
        let text = FullText::new("abc");
        let t = table(json!({"bodyRows": [{"cells": [
            {"rowSpan": 2, "colSpan": "3"},
            {"rowSpan": 0},
            {"colSpan": -1},
            {}
        ]}]}));
        let spans: Vec<(u32, u32)> = build_grid(&t, &text).structured_rows[0]
            .iter()
            .map(|c| (c.row_span, c.col_span))
            .collect();
        assert_eq!(spans, [(2, 3), (1, 1), (1, 1), (1, 1)]);
    }

    #[test]
    fn malformed_cells_resolve_to_empty_text() {
        let text = FullText::new("ok");
        let t = table(json!({"bodyRows": [{"cells": [
            {"layout": null},
            {"layout": {"textAnchor": "bad"}},
            cell(0, 2),
            cell(0, 50)
        ]}]}));
        let grid = build_grid(&t, &text);
        assert_eq!(grid.simple_matrix, matrix(&[&["", "", "ok", ""]]));
    }

    #[test]
    fn nested_cell_blocks_supply_text() {
        let text = FullText::new("");
        let t = table(json!({"bodyRows": [{"cells": [{"blocks": [
            {"textBlock": {"text": " first ", "type": "paragraph"}},
            {"textBlock": {"text": "second"}}
        ]}]}]}));
        assert_eq!(build_grid(&t, &text).simple_matrix, matrix(&[&["first second"]]));
    }

    #[test]
    fn empty_table_is_empty_grid() {
        let grid = build_grid(&TableBlock::default(), &FullText::new(""));
        assert!(grid.structured_rows.is_empty());
        assert!(grid.simple_matrix.is_empty());
        assert_eq!(grid.to_markdown(), "");
        assert!(grid.occupancy_grid().is_empty());
    }

    #[test]
    fn markdown_pads_and_escapes() {
        let data = TableData {
            structured_rows: Vec::new(),
            simple_matrix: matrix(&[&["Name", "Value"], &["a|b"], &["multi\nline", "2", "extra"]]),
        };
        assert_eq!(
            data.to_markdown(),
            "| Name | Value |\n| --- | --- |\n| a\\|b |  |\n| multi line | 2 |"
        );
    }

    #[test]
    fn occupancy_grid_places_spans() {
        let c = |text: &str, row_span, col_span| TableCellData {
            text: text.into(),
            row_span,
            col_span,
        };
        let data = TableData {
            structured_rows: vec![
                vec![c("A", 2, 1), c("B", 1, 2)],
                vec![c("C", 1, 1), c("D", 1, 1)],
            ],
            simple_matrix: Vec::new(),
        };
        let grid = data.occupancy_grid();
        assert_eq!(grid.len(), 2);
        assert!(grid.iter().all(|row| row.len() == 3));
        assert!(matches!(grid[0][0], Slot::Cell(cell) if cell.text == "A"));
        assert!(matches!(grid[0][1], Slot::Cell(cell) if cell.text == "B"));
        assert_eq!(grid[0][2], Slot::Spanned { row: 0, col: 1 });
        assert_eq!(grid[1][0], Slot::Spanned { row: 0, col: 0 });
        assert!(matches!(grid[1][1], Slot::Cell(cell) if cell.text == "C"));
        assert!(matches!(grid[1][2], Slot::Cell(cell) if cell.text == "D"));
    }

    #[test]
    fn occupancy_grid_clips_row_spans_and_pads_short_rows() {
        let c = |text: &str, row_span| TableCellData {
            text: text.into(),
            row_span,
            col_span: 1,
        };
        let data = TableData {
            structured_rows: vec![vec![c("A", 9), c("B", 1)], vec![]],
            simple_matrix: Vec::new(),
        };
        let grid = data.occupancy_grid();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[1], vec![Slot::Spanned { row: 0, col: 0 }, Slot::Empty]);
    }

    #[test]
    fn oversized_column_spans_are_clipped() {
        let t = table(json!({"bodyRows": [{"cells": [{"colSpan": 20_000_000}]}]}));
        let data = build_grid(&t, &FullText::new(""));
        assert_eq!(data.structured_rows[0][0].col_span, 20_000_000);

        let grid = data.occupancy_grid();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0].len(), 1);
        assert!(matches!(grid[0][0], Slot::Cell(_)));

        let t = table(json!({"bodyRows": [
            {"cells": [{"colSpan": u32::MAX}, {}]},
            {"cells": [{}, {}, {}]}
        ]}));
        let data = build_grid(&t, &FullText::new(""));
        let grid = data.occupancy_grid();
        assert!(grid.iter().all(|row| row.len() == 5));
    }

    #[test]
    fn staggered_spans_keep_their_width() {
        let c = |text: &str, col_span| TableCellData {
            text: text.into(),
            row_span: 1,
            col_span,
        };
        let data = TableData {
            structured_rows: vec![vec![c("X", 2), c("Y", 1)], vec![c("p", 1), c("q", 2)]],
            simple_matrix: Vec::new(),
        };
        assert_eq!(data.span_width(), 3);
        let grid = data.occupancy_grid();
        assert_eq!(grid[0][1], Slot::Spanned { row: 0, col: 0 });
        assert!(matches!(grid[0][2], Slot::Cell(cell) if cell.text == "Y"));
        assert_eq!(grid[1][2], Slot::Spanned { row: 1, col: 1 });
    }

    #[test]
    fn table_kind_heuristics() {
        assert_eq!(TableKind::detect(&matrix(&[&["Year", "Revenue"], &["2023", "10"]])), TableKind::TimeSeries);
        assert_eq!(TableKind::detect(&matrix(&[&["Model", "A", "B"], &["x", "1", "2"]])), TableKind::Comparison);
        assert_eq!(TableKind::detect(&matrix(&[&["Item", "Cost"], &["Total", "9"]])), TableKind::Summary);
        assert_eq!(TableKind::detect(&matrix(&[&["Item", "Cost"], &["pen", "2"]])), TableKind::Data);
        assert_eq!(TableKind::detect(&matrix(&[&["Year"]])), TableKind::Data);
        assert_eq!(TableKind::TimeSeries.as_str(), "time-series");
    }
}
