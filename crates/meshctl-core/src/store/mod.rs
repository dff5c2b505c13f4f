// ── Reactive device store ──
//
// Lock-free device directory and state cache with push-based change
// notification.

mod data_store;
mod directory;
mod state_cache;

pub use data_store::DataStore;
