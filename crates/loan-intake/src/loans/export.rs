//! Excel export of loan applications.
//!
//! Workbooks are built in memory per call and handed back as bytes, so two
//! concurrent downloads never share a file on disk.

use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use super::domain::LoanApplication;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const EXPORT_COLUMNS: [&str; 10] = [
    "ID",
    "Name",
    "CNIC",
    "Address",
    "District",
    "Tehsil",
    "Amount",
    "Purpose",
    "Contact",
    "Created At",
];

const COLUMN_WIDTHS: [f64; 10] = [8.0, 24.0, 16.0, 32.0, 16.0, 16.0, 12.0, 18.0, 16.0, 20.0];

const SHEET_NAME: &str = "Loan Applications";

/// `2025-03-01 02:45 PM`
pub fn format_created_at(created_at: NaiveDateTime) -> String {
    created_at.format("%Y-%m-%d %I:%M %p").to_string()
}

/// One spreadsheet cell; ids and amounts stay numeric so Excel can sum them.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportCell {
    Number(f64),
    Text(String),
}

pub fn export_row(record: &LoanApplication) -> [ExportCell; 10] {
    [
        ExportCell::Number(record.id.0 as f64),
        ExportCell::Text(record.name.clone()),
        ExportCell::Text(record.cnic.clone()),
        ExportCell::Text(record.address.clone()),
        ExportCell::Text(record.district.clone()),
        ExportCell::Text(record.tehsil.clone()),
        ExportCell::Number(record.amount),
        ExportCell::Text(record.purpose.clone()),
        ExportCell::Text(record.contact.clone()),
        ExportCell::Text(format_created_at(record.created_at)),
    ]
}

/// A generated workbook ready to be sent as an attachment or written to disk.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub filename: String,
    pub rows: usize,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn content_type(&self) -> &'static str {
        XLSX_CONTENT_TYPE
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no loan applications to export")]
    Empty,
    #[error("failed to build workbook: {0}")]
    Workbook(#[from] XlsxError),
}

/// Serializes `records` in the given order. An empty slice is refused rather
/// than producing a header-only workbook.
pub fn export(
    records: &[LoanApplication],
    generated_at: NaiveDateTime,
) -> Result<ExportArtifact, ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, (title, width)) in EXPORT_COLUMNS.iter().zip(COLUMN_WIDTHS).enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, *title, &header)?;
        worksheet.set_column_width(col, width)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, cell) in export_row(record).into_iter().enumerate() {
            let col = col as u16;
            match cell {
                ExportCell::Number(value) => {
                    worksheet.write_number(row, col, value)?;
                }
                ExportCell::Text(value) => {
                    worksheet.write_string(row, col, value)?;
                }
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    Ok(ExportArtifact {
        filename: format!(
            "loan_applications_{}.xlsx",
            generated_at.format("%Y%m%d_%H%M%S")
        ),
        rows: records.len(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loans::domain::ApplicationId;
    use chrono::NaiveDate;

    fn timestamp(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid timestamp")
    }

    fn record() -> LoanApplication {
        LoanApplication {
            id: ApplicationId(7),
            name: "Ali".to_string(),
            cnic: "12345".to_string(),
            address: "X".to_string(),
            district: "Lahore".to_string(),
            tehsil: "Model Town".to_string(),
            amount: 5000.0,
            purpose: "Business".to_string(),
            contact: "03001234567".to_string(),
            created_at: timestamp(14, 45),
        }
    }

    #[test]
    fn created_at_uses_twelve_hour_clock() {
        assert_eq!(format_created_at(timestamp(14, 45)), "2025-03-01 02:45 PM");
        assert_eq!(format_created_at(timestamp(0, 5)), "2025-03-01 12:05 AM");
    }

    #[test]
    fn row_follows_column_order() {
        let row = export_row(&record());
        assert_eq!(row[0], ExportCell::Number(7.0));
        assert_eq!(row[4], ExportCell::Text("Lahore".to_string()));
        assert_eq!(row[5], ExportCell::Text("Model Town".to_string()));
        assert_eq!(row[6], ExportCell::Number(5000.0));
        assert_eq!(row[9], ExportCell::Text("2025-03-01 02:45 PM".to_string()));
        assert_eq!(EXPORT_COLUMNS[6], "Amount");
        assert_eq!(EXPORT_COLUMNS[9], "Created At");
    }

    #[test]
    fn empty_input_is_refused() {
        let err = export(&[], timestamp(9, 0)).expect_err("nothing to export");
        assert!(matches!(err, ExportError::Empty));
    }

    #[test]
    fn produces_a_zip_container() {
        let artifact = export(&[record()], timestamp(9, 30)).expect("workbook builds");
        assert_eq!(artifact.rows, 1);
        assert_eq!(artifact.filename, "loan_applications_20250301_093000.xlsx");
        assert!(artifact.bytes.starts_with(b"PK"));
        assert_eq!(artifact.content_type(), XLSX_CONTENT_TYPE);
    }
}
