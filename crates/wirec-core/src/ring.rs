use std::collections::VecDeque;

use crate::table::{CodeTable, InverseCodeTable, TableVersion};

/// Largest history that keeps every retained version distinct from `active`
/// and `next` across the 128-version wrap.
pub const MAX_KEEP_OLD_TABLES: usize = TableVersion::MAX as usize - 1;

/// The decode-side tables for one origin and one value kind.
///
/// `active` is what the peer is expected to use, `next` is the table being
/// advertised (or an empty placeholder carrying the next version), and `old`
/// keeps the last few retired tables so in-flight messages still decode.
/// The disabled sentinel is always resolvable on top of `old`.
#[derive(Debug)]
pub struct TableRing<T> {
    old: VecDeque<InverseCodeTable<T>>,
    keep_old: usize,
    disabled: InverseCodeTable<T>,
    active: InverseCodeTable<T>,
    next: InverseCodeTable<T>,
    pending: Option<CodeTable<T>>,
}

impl<T> TableRing<T> {
    pub fn new(origin_id: u64, keep_old: usize) -> Self {
        if keep_old > MAX_KEEP_OLD_TABLES {
            tracing::warn!(
                "Keeping {} old tables would reuse live versions, clamping to {}",
                keep_old,
                MAX_KEEP_OLD_TABLES
            );
        }
        let keep_old = keep_old.min(MAX_KEEP_OLD_TABLES);
        Self {
            old: VecDeque::with_capacity(keep_old + 1),
            keep_old,
            disabled: InverseCodeTable::disabled(origin_id),
            active: InverseCodeTable::empty(origin_id, TableVersion::INITIAL),
            next: InverseCodeTable::empty(origin_id, TableVersion::INITIAL.next()),
            pending: None,
        }
    }

    pub fn active(&self) -> &InverseCodeTable<T> {
        &self.active
    }

    pub fn next(&self) -> &InverseCodeTable<T> {
        &self.next
    }

    pub fn pending(&self) -> Option<&CodeTable<T>> {
        self.pending.as_ref()
    }

    pub fn pending_version(&self) -> Option<TableVersion> {
        self.pending.as_ref().map(|t| t.version())
    }

    pub fn is_pending(&self, version: TableVersion) -> bool {
        self.pending_version() == Some(version)
    }

    /// Newest first, ending with the disabled sentinel.
    pub fn history_versions(&self) -> Vec<TableVersion> {
        self.old
            .iter()
            .map(|t| t.version())
            .chain(std::iter::once(self.disabled.version()))
            .collect()
    }

    /// Active table first, then history. Pending tables are not selectable
    /// until they are cut over.
    pub fn select(&self, version: TableVersion) -> Option<&InverseCodeTable<T>> {
        if self.active.version() == version {
            return Some(&self.active);
        }
        self.old
            .iter()
            .find(|t| t.version() == version)
            .or_else(|| (self.disabled.version() == version).then_some(&self.disabled))
    }

    /// Installs a freshly built table as `next` and marks it in flight.
    pub fn begin_advertisement(&mut self, table: CodeTable<T>, inverse: InverseCodeTable<T>) {
        self.next = inverse;
        self.pending = Some(table);
    }

    /// `next` becomes `active`; the old active is retired, dropping the oldest
    /// retired table when the history is full.
    pub fn start_using_next(&mut self) {
        let origin_id = self.next.origin_id();
        let fresh = InverseCodeTable::empty(origin_id, self.next.version().next());
        let retired = std::mem::replace(&mut self.active, std::mem::replace(&mut self.next, fresh));
        self.old.push_front(retired);
        self.old.truncate(self.keep_old);
        self.pending = None;
    }
}
