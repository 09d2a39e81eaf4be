pub mod batch_repo;
pub mod generation_job_repo;
pub mod ledger_repo;

pub use batch_repo::BatchRepo;
pub use generation_job_repo::GenerationJobRepo;
pub use ledger_repo::LedgerRepo;
