use crate::model::{EntityKind, Id, Record, Timestamp};

/// A unique code that belonged to a deleted row and stays reserved.
#[derive(Debug, Clone, PartialEq)]
pub struct RetiredCode {
    pub kind: EntityKind,
    pub field: &'static str,
    pub value: String,
    pub retired_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Insert(Record),
    Update(Record),
    Delete { kind: EntityKind, id: Id },
    RetireCode(RetiredCode),
}

/// Ordered list of changes a store applies all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: Record) {
        self.changes.push(Change::Insert(record));
    }

    pub fn update(&mut self, record: Record) {
        self.changes.push(Change::Update(record));
    }

    pub fn delete(&mut self, kind: EntityKind, id: Id) {
        self.changes.push(Change::Delete { kind, id });
    }

    pub fn retire(&mut self, code: RetiredCode) {
        self.changes.push(Change::RetireCode(code));
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}
