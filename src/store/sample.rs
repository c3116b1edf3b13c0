use crate::models::{BoundingBox, ExtractedData, FieldCoordinates, LineItem};

/// 预置参考采购单键
pub const SAMPLE_PO_KEY: &str = "PO/MEITY/2024/221";

/// 预置参考采购单
pub fn sample_reference() -> ExtractedData {
    ExtractedData {
        vendor: "Tech Solutions India Pvt Ltd".to_string(),
        seller: None,
        invoice_no: SAMPLE_PO_KEY.to_string(),
        date: "2024-01-15".to_string(),
        total_amount: 500_000.0,
        tax_amount: 90_000.0,
        gst_no: Some("29ABCDE1234F1Z5".to_string()),
        po_no: Some(SAMPLE_PO_KEY.to_string()),
        anomalies: None,
        line_items: vec![
            LineItem::new("Enterprise Server Hardware", 10.0, 41_000.0, 410_000.0).with_hsn("847130"),
        ],
        field_coords: None,
    }
}

/// 内置样例发票
pub fn sample_invoice() -> ExtractedData {
    let field_coords: FieldCoordinates = [
        ("vendor", BoundingBox::new(15.0, 12.0, 40.0, 5.0)),
        ("invoiceNo", BoundingBox::new(70.0, 15.0, 20.0, 4.0)),
        ("gstNo", BoundingBox::new(15.0, 18.0, 30.0, 3.0)),
        ("totalAmount", BoundingBox::new(65.0, 75.0, 25.0, 6.0)),
        ("date", BoundingBox::new(70.0, 20.0, 20.0, 3.0)),
        ("poNo", BoundingBox::new(70.0, 24.0, 20.0, 3.0)),
    ]
    .into_iter()
    .map(|(field, bbox)| (field.to_string(), bbox))
    .collect();

    ExtractedData {
        vendor: "Tech Solutions India Pvt Ltd".to_string(),
        seller: None,
        invoice_no: "INV-2024-0891".to_string(),
        date: "2024-02-20".to_string(),
        total_amount: 590_000.0,
        tax_amount: 90_000.0,
        gst_no: Some("29ABCDE1234F1Z5".to_string()),
        po_no: Some(SAMPLE_PO_KEY.to_string()),
        anomalies: None,
        line_items: vec![
            LineItem::new("Enterprise Server Hardware", 10.0, 41_000.0, 410_000.0)
                .with_hsn("847130")
                .with_coords(BoundingBox::new(10.0, 45.0, 80.0, 8.0)),
            LineItem::new("Network Infrastructure Setup", 1.0, 90_000.0, 90_000.0)
                .with_hsn("998314")
                .with_coords(BoundingBox::new(10.0, 55.0, 80.0, 8.0)),
        ],
        field_coords: Some(field_coords),
    }
}
