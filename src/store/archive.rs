use dashmap::DashMap;
use std::sync::{PoisonError, RwLock};

use super::sample::{sample_reference, SAMPLE_PO_KEY};
use crate::models::ExtractedData;

/// 法定档案库：参考单据 (键 -> 单据) + 已上传发票 (仅追加)
///
/// 并发请求共享同一实例；同键并发写入时后写覆盖。
pub struct StatutoryArchive {
    reference_documents: DashMap<String, ExtractedData>,
    uploaded_invoices: RwLock<Vec<ExtractedData>>,
}

impl StatutoryArchive {
    /// 含预置参考单据
    pub fn new() -> Self {
        let archive = Self::empty();
        archive.add_reference(SAMPLE_PO_KEY, sample_reference());
        archive
    }

    pub fn empty() -> Self {
        Self {
            reference_documents: DashMap::new(),
            uploaded_invoices: RwLock::new(Vec::new()),
        }
    }

    pub fn add_invoice(&self, invoice: ExtractedData) {
        self.uploaded_invoices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invoice);
    }

    pub fn add_reference(&self, key: impl Into<String>, reference: ExtractedData) {
        self.reference_documents.insert(key.into(), reference);
    }

    pub fn reference(&self, key: &str) -> Option<ExtractedData> {
        self.reference_documents.get(key).map(|entry| entry.value().clone())
    }

    /// 已上传发票快照 (按追加顺序)
    pub fn invoices(&self) -> Vec<ExtractedData> {
        self.uploaded_invoices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn invoice_count(&self) -> usize {
        self.uploaded_invoices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 参考单据快照 (按键排序)
    pub fn references(&self) -> Vec<(String, ExtractedData)> {
        let mut all: Vec<_> = self
            .reference_documents
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn reference_count(&self) -> usize {
        self.reference_documents.len()
    }
}

impl Default for StatutoryArchive {
    fn default() -> Self {
        Self::new()
    }
}
