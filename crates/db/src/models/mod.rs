pub mod batch;
pub mod generation_job;
pub mod ledger_entry;
