pub mod errors;
pub mod invoices;
pub mod progress;
pub mod sync;
