use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use shared::domain::{UserId, UserRecord};
use tracing::debug;

use crate::record_store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Name,
    Email,
}

impl Column {
    pub const ALL: [Column; 3] = [Column::Id, Column::Name, Column::Email];

    pub fn label(self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::Name => "Name",
            Column::Email => "Email",
        }
    }

    /// Stringified cell value, the form filters match against.
    pub fn value_of(self, record: &UserRecord) -> String {
        match self {
            Column::Id => record.id.0.to_string(),
            Column::Name => record.name.clone(),
            Column::Email => record.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Everything the projection depends on besides the records themselves.
#[derive(Debug, Clone)]
pub struct ViewParams {
    pub sort: Option<(Column, SortDirection)>,
    pub filters: HashMap<Column, String>,
    pub hidden_columns: HashSet<Column>,
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            sort: None,
            filters: HashMap::new(),
            hidden_columns: HashSet::new(),
            page_index: 0,
            page_size: 10,
        }
    }
}

/// One computed page of the table.
#[derive(Debug, Clone)]
pub struct Projection {
    /// Rows of the current page, filtered and sorted.
    pub rows: Vec<UserRecord>,
    /// How many records pass the active filters across all pages.
    pub total_matching: usize,
    /// Page index after clamping to the last non-empty page.
    pub page_index: usize,
    pub page_count: usize,
}

fn compare(column: Column, a: &UserRecord, b: &UserRecord) -> Ordering {
    match column {
        Column::Id => a.id.0.cmp(&b.id.0),
        Column::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        Column::Email => a.email.to_lowercase().cmp(&b.email.to_lowercase()),
    }
}

fn matches_filters(record: &UserRecord, filters: &HashMap<Column, String>) -> bool {
    filters.iter().all(|(column, pattern)| {
        pattern.is_empty()
            || column
                .value_of(record)
                .to_lowercase()
                .contains(&pattern.to_lowercase())
    })
}

/// Pure projection of records through view parameters. Sorting uses a
/// stable sort, so records with equal keys never swap relative order
/// across recomputations.
pub fn project(records: &[UserRecord], params: &ViewParams) -> Projection {
    let mut rows: Vec<UserRecord> = records
        .iter()
        .filter(|record| matches_filters(record, &params.filters))
        .cloned()
        .collect();

    if let Some((column, direction)) = params.sort {
        rows.sort_by(|a, b| {
            let ordering = compare(column, a, b);
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }

    let total_matching = rows.len();
    let page_size = params.page_size.max(1);
    let page_count = total_matching.div_ceil(page_size);
    let page_index = params.page_index.min(page_count.saturating_sub(1));
    let start = page_index * page_size;
    let rows = rows
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect();

    Projection {
        rows,
        total_matching,
        page_index,
        page_count,
    }
}

/// Ids of the rows currently ticked. Scoped to rows that are actually
/// present; ids that disappear from the store are pruned.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    ids: HashSet<UserId>,
}

impl SelectionSet {
    pub fn is_selected(&self, id: UserId) -> bool {
        self.ids.contains(&id)
    }

    pub fn toggle(&mut self, id: UserId) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    pub fn select(&mut self, id: UserId) {
        self.ids.insert(id);
    }

    pub fn deselect(&mut self, id: UserId) {
        self.ids.remove(&id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.ids.iter().copied()
    }

    /// Drop entries whose id no longer exists in the store.
    pub fn prune(&mut self, store: &RecordStore) {
        self.ids.retain(|id| store.contains(*id));
    }
}

#[derive(Debug)]
struct CachedProjection {
    version: u64,
    projection: Projection,
}

/// View parameters plus row selection, with the last projection cached
/// against the store version it was computed from.
#[derive(Debug, Default)]
pub struct TableModel {
    params: ViewParams,
    selection: SelectionSet,
    cache: Option<CachedProjection>,
}

impl TableModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        let mut model = Self::default();
        model.params.page_size = page_size.max(1);
        model
    }

    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionSet {
        &mut self.selection
    }

    /// Current page of the table, recomputed only when the store or the
    /// view parameters changed since the last call.
    pub fn projection(&mut self, store: &RecordStore) -> &Projection {
        let version = store.version();
        if self
            .cache
            .as_ref()
            .is_some_and(|cached| cached.version != version)
        {
            self.cache = None;
        }
        let params = &self.params;
        let cached = self.cache.get_or_insert_with(|| {
            debug!(version, "recomputing table projection");
            CachedProjection {
                version,
                projection: project(store.records(), params),
            }
        });
        &cached.projection
    }

    fn invalidate(&mut self) {
        self.cache = None;
    }

    /// First click sorts ascending; clicking the sorted column again
    /// flips the direction.
    pub fn toggle_sort(&mut self, column: Column) {
        self.params.sort = match self.params.sort {
            Some((current, SortDirection::Ascending)) if current == column => {
                Some((column, SortDirection::Descending))
            }
            Some((current, SortDirection::Descending)) if current == column => {
                Some((column, SortDirection::Ascending))
            }
            _ => Some((column, SortDirection::Ascending)),
        };
        self.invalidate();
    }

    /// Empty pattern removes the filter for that column.
    pub fn set_filter(&mut self, column: Column, pattern: &str) {
        if pattern.is_empty() {
            self.params.filters.remove(&column);
        } else {
            self.params.filters.insert(column, pattern.to_string());
        }
        self.invalidate();
    }

    pub fn set_page(&mut self, page_index: usize) {
        self.params.page_index = page_index;
        self.invalidate();
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.params.page_size = page_size.max(1);
        self.invalidate();
    }

    pub fn toggle_column(&mut self, column: Column) {
        if !self.params.hidden_columns.remove(&column) {
            self.params.hidden_columns.insert(column);
        }
    }

    pub fn visible_columns(&self) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|column| !self.params.hidden_columns.contains(column))
            .collect()
    }

    pub fn toggle_select(&mut self, id: UserId) {
        self.selection.toggle(id);
    }

    /// Header checkbox behavior: if every row of the current filtered
    /// page is selected, deselect them all, otherwise select them all.
    /// Only rows passing the active filters are touched, never the full
    /// record set.
    pub fn toggle_select_page(&mut self, store: &RecordStore) {
        let page_ids: Vec<UserId> = self
            .projection(store)
            .rows
            .iter()
            .map(|record| record.id)
            .collect();
        let all_selected = !page_ids.is_empty()
            && page_ids.iter().all(|id| self.selection.is_selected(*id));
        for id in page_ids {
            if all_selected {
                self.selection.deselect(id);
            } else {
                self.selection.select(id);
            }
        }
    }

    /// Snapshot of the selected records in store order, used as the
    /// captured target of a bulk-delete confirmation.
    pub fn selected_records(&self, store: &RecordStore) -> Vec<UserRecord> {
        store
            .records()
            .iter()
            .filter(|record| self.selection.is_selected(record.id))
            .cloned()
            .collect()
    }

    pub fn prune_selection(&mut self, store: &RecordStore) {
        self.selection.prune(store);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: i64, name: &str, email: &str) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: UserId(id),
            name: name.to_string(),
            email: email.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn seeded_store() -> RecordStore {
        let mut store = RecordStore::new();
        store.replace_all(vec![
            record(1, "Dave", "dave@corp.example"),
            record(2, "alice", "alice@example.com"),
            record(3, "Bob", "bob@example.com"),
            record(4, "carol", "carol@corp.example"),
        ]);
        store
    }

    fn row_ids(projection: &Projection) -> Vec<i64> {
        projection.rows.iter().map(|r| r.id.0).collect()
    }

    #[test]
    fn sorting_twice_under_a_filter_reverses_the_matching_subset() {
        let store = seeded_store();
        let mut params = ViewParams::default();
        params.filters.insert(Column::Email, "example.com".into());

        params.sort = Some((Column::Name, SortDirection::Ascending));
        let ascending = project(store.records(), &params);
        params.sort = Some((Column::Name, SortDirection::Descending));
        let descending = project(store.records(), &params);

        assert_eq!(row_ids(&ascending), vec![2, 3]);
        let mut reversed = row_ids(&ascending);
        reversed.reverse();
        assert_eq!(row_ids(&descending), reversed);
    }

    #[test]
    fn name_sort_is_case_insensitive() {
        let store = seeded_store();
        let params = ViewParams {
            sort: Some((Column::Name, SortDirection::Ascending)),
            ..Default::default()
        };
        let projection = project(store.records(), &params);
        assert_eq!(row_ids(&projection), vec![2, 3, 4, 1]);
    }

    #[test]
    fn empty_filter_pattern_matches_everything() {
        let store = seeded_store();
        let mut params = ViewParams::default();
        params.filters.insert(Column::Name, String::new());
        let projection = project(store.records(), &params);
        assert_eq!(projection.total_matching, 4);
    }

    #[test]
    fn page_index_is_clamped_to_the_last_page() {
        let store = seeded_store();
        let params = ViewParams {
            page_index: 9,
            page_size: 3,
            ..Default::default()
        };
        let projection = project(store.records(), &params);
        assert_eq!(projection.page_index, 1);
        assert_eq!(projection.page_count, 2);
        assert_eq!(projection.rows.len(), 1);
    }

    #[test]
    fn select_all_after_a_filter_selects_only_matching_rows() {
        let store = seeded_store();
        let mut model = TableModel::new();
        model.set_filter(Column::Email, "corp.example");

        model.toggle_select_page(&store);

        let mut selected: Vec<i64> = model.selection().ids().map(|id| id.0).collect();
        selected.sort_unstable();
        assert_eq!(selected, vec![1, 4]);
    }

    #[test]
    fn select_all_toggles_off_when_the_whole_page_is_selected() {
        let store = seeded_store();
        let mut model = TableModel::new();
        model.toggle_select_page(&store);
        assert_eq!(model.selection().len(), 4);
        model.toggle_select_page(&store);
        assert!(model.selection().is_empty());
    }

    #[test]
    fn selection_survives_resorting() {
        let store = seeded_store();
        let mut model = TableModel::new();
        model.toggle_select(UserId(3));
        model.toggle_sort(Column::Email);
        model.toggle_sort(Column::Email);
        let _ = model.projection(&store);
        assert!(model.selection().is_selected(UserId(3)));
    }

    #[test]
    fn pruning_drops_selected_ids_removed_from_the_store() {
        let mut store = seeded_store();
        let mut model = TableModel::new();
        model.toggle_select(UserId(2));
        model.toggle_select(UserId(3));

        store.remove_many(&[UserId(2)]);
        model.prune_selection(&store);

        assert!(!model.selection().is_selected(UserId(2)));
        assert!(model.selection().is_selected(UserId(3)));
    }

    #[test]
    fn projection_is_recomputed_after_a_store_mutation() {
        let mut store = seeded_store();
        let mut model = TableModel::new();
        assert_eq!(model.projection(&store).total_matching, 4);

        store.remove_many(&[UserId(1)]);
        assert_eq!(model.projection(&store).total_matching, 3);
    }

    #[test]
    fn hidden_columns_are_excluded_from_the_visible_set() {
        let mut model = TableModel::new();
        model.toggle_column(Column::Email);
        assert_eq!(model.visible_columns(), vec![Column::Id, Column::Name]);
        model.toggle_column(Column::Email);
        assert_eq!(model.visible_columns().len(), 3);
    }
}
