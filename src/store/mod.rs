pub mod archive;
pub mod export;
pub mod sample;

pub use archive::StatutoryArchive;
pub use export::export_invoices_csv;
pub use sample::{sample_invoice, sample_reference, SAMPLE_PO_KEY};
