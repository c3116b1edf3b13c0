use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 页面坐标 (百分比)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

/// 单据明细行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,             // 原样保留，不重新计算
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsn_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<BoundingBox>,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: f64, unit_price: f64, total: f64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            total,
            hsn_code: None,
            coords: None,
        }
    }

    pub fn with_hsn(mut self, hsn_code: impl Into<String>) -> Self {
        self.hsn_code = Some(hsn_code.into());
        self
    }

    pub fn with_coords(mut self, coords: BoundingBox) -> Self {
        self.coords = Some(coords);
        self
    }
}

/// 字段名 -> 坐标 (vendor, invoiceNo, gstNo, totalAmount, date, poNo)
pub type FieldCoordinates = IndexMap<String, BoundingBox>;

/// 抽取结果：发票或参考采购单 (PO)
///
/// 由抽取能力或合成逻辑一次性构造，之后只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    pub vendor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    pub invoice_no: String,
    pub date: String,
    pub total_amount: f64,
    pub tax_amount: f64,
    #[serde(default)]
    pub gst_no: Option<String>,
    #[serde(default)]
    pub po_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<Vec<String>>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_coords: Option<FieldCoordinates>,
}

impl ExtractedData {
    /// 参考单据键 (空白视为缺失)
    pub fn reference_key(&self) -> Option<&str> {
        self.po_no.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn field_locator(&self, field: &str) -> Option<BoundingBox> {
        self.field_coords.as_ref().and_then(|m| m.get(field).copied())
    }

    pub fn anomalies(&self) -> &[String] {
        self.anomalies.as_deref().unwrap_or(&[])
    }
}
