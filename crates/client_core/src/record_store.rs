use shared::domain::{UserId, UserRecord};

/// In-memory cache of the user records the service last reported.
///
/// This is the single source of local truth the table renders from.
/// Membership changes only through the three total operations below;
/// everything else reads a snapshot. Each mutation bumps `version` so
/// derived projections can detect staleness without being notified.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<UserRecord>,
    version: u64,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[UserRecord] {
        &self.records
    }

    pub fn get(&self, id: UserId) -> Option<&UserRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Monotonic counter, bumped on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Full replace from a fresh fetch. Input order is kept; a
    /// duplicated id in the input overwrites the earlier entry in
    /// place, so the store never holds two records with the same id.
    pub fn replace_all(&mut self, records: Vec<UserRecord>) {
        self.records.clear();
        for record in records {
            self.apply_upsert(record);
        }
        self.version += 1;
    }

    /// Insert at the tail if the id is absent, otherwise overwrite the
    /// existing record's fields, keeping its position.
    pub fn upsert(&mut self, record: UserRecord) {
        self.apply_upsert(record);
        self.version += 1;
    }

    /// Drop every listed id. Survivors keep their relative order;
    /// removed ids leave no residue. Ids not present are ignored.
    pub fn remove_many(&mut self, ids: &[UserId]) {
        self.records.retain(|record| !ids.contains(&record.id));
        self.version += 1;
    }

    fn apply_upsert(&mut self, record: UserRecord) {
        match self.records.iter_mut().find(|held| held.id == record.id) {
            Some(held) => *held = record,
            None => self.records.push(record),
        }
    }
}
