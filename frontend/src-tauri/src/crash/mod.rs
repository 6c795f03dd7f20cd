pub mod persistence;

pub use persistence::{CrashPersistence, CrashRecord};
