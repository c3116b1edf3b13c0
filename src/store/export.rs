use std::io::Write;

use crate::models::ExtractedData;

const HEADER: [&str; 9] = [
    "invoice_no",
    "vendor",
    "seller",
    "date",
    "total_amount",
    "tax_amount",
    "gst_no",
    "po_no",
    "line_item_count",
];

/// 将 Option<String> 转换为 CSV 字符串
fn option_to_csv(val: &Option<String>) -> String {
    val.clone().unwrap_or_default()
}

/// 导出已归档发票到 CSV
pub fn export_invoices_csv<W: Write>(invoices: &[ExtractedData], output: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(HEADER)?;

    for invoice in invoices {
        writer.write_record(&[
            invoice.invoice_no.clone(),
            invoice.vendor.clone(),
            option_to_csv(&invoice.seller),
            invoice.date.clone(),
            format!("{:.2}", invoice.total_amount),
            format!("{:.2}", invoice.tax_amount),
            option_to_csv(&invoice.gst_no),
            option_to_csv(&invoice.po_no),
            invoice.line_items.len().to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
