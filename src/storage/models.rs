// storage/models.rs
// Store records and fetched batches

/// Store-assigned record identifier (SQLite `INTEGER PRIMARY KEY AUTOINCREMENT`).
///
/// Identifiers are strictly increasing within a queue and never reused, so they
/// double as the insertion order.
pub type RecordId = i64;

/// One stored event: an opaque serialized payload plus its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub data: Vec<u8>,
}

/// Records returned by a single fetch, oldest first.
///
/// The identifiers travel with the payloads so that an upload outcome can be
/// correlated back to exactly the rows that composed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub records: Vec<Record>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Identifiers in fetch order.
    pub fn identifiers(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// Splits the batch into payloads and identifiers (same order, same length).
    pub fn into_parts(self) -> (Vec<Vec<u8>>, Vec<RecordId>) {
        self.records.into_iter().map(|r| (r.data, r.id)).unzip()
    }
}
