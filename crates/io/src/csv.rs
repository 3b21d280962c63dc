// CSV export of one grid: category rows × month columns

use splitgrid_core::{format_cents, GridLayout};
use splitgrid_recon::{GridError, GridStore};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Render `grid_id` as CSV, one row per category in row order. Empty cells
/// stay empty rather than `0.00`, so "never written" is visible.
pub fn export_csv<G: GridStore + ?Sized>(
    grids: &G,
    grid_id: &str,
    layout: &GridLayout,
) -> Result<String, GridError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["category".to_string(), "row".to_string()];
    header.extend(MONTHS.iter().map(|m| m.to_string()));
    wtr.write_record(&header).map_err(write_err)?;

    for (category, row) in layout.categories.by_row() {
        let mut record = vec![category.to_string(), row.to_string()];
        for month in 0..12u8 {
            let column = layout
                .resolve_period(month)
                .map_err(|e| GridError::Storage(e.to_string()))?;
            let address = splitgrid_core::CellAddress::new(column, row);
            let value = grids.read_cell(grid_id, &address)?;
            record.push(value.map(format_cents).unwrap_or_default());
        }
        wtr.write_record(&record).map_err(write_err)?;
    }

    let bytes = wtr.into_inner().map_err(|e| GridError::Storage(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| GridError::Storage(e.to_string()))
}

fn write_err(e: csv::Error) -> GridError {
    GridError::Storage(e.to_string())
}
