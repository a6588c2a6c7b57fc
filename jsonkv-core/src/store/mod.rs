/*
    Store subsystem - Entry table, validation, TTL and persistence
*/

pub mod data_file;
pub mod entry;
pub mod errors;
pub mod local_store;
pub mod ttl;
pub mod validator;

pub use data_file::DataFile;
pub use entry::{Entry, EntryTable};
pub use errors::*;
pub use local_store::{ClearOutcome, LocalStore, StoreStats};
pub use ttl::{Clock, ManualClock, SystemClock};
pub use validator::{ValidationRules, Validator};
