mod sync_worker;

pub use sync_worker::SyncWorker;
