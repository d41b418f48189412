//! Column family definitions for RocksDB.
//!
//! - records: Append-only log records keyed by id (Universal compaction, zstd)

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for log records
pub const CF_RECORDS: &str = "records";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_RECORDS];

/// Create column family options for records (append-only, compressed)
fn records_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![ColumnFamilyDescriptor::new(CF_RECORDS, records_options())]
}
