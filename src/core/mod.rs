pub mod classifier;
pub mod engine;
pub mod fingerprint;
pub mod scanner;

pub use classifier::{classify, compare, EntryKind, SyncState};
pub use engine::{LocalFile, ScanEntry, SyncConfig, SyncEngine, SyncReport};
pub use fingerprint::{fingerprint, fingerprint_bytes, fingerprint_file, Fingerprint, CHUNK_SIZE};
pub use scanner::{FileEntry, FileScanner, FileWalk, ScanConfig};
