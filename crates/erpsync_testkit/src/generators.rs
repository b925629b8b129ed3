//! Property-based test generators using proptest.

use crate::shop::{category, subcategory};
use erpsync_core::Record;
use proptest::prelude::*;

/// Strategy for category names.
pub fn category_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{2,12}( [a-z]{2,8})?").expect("Invalid regex")
}

/// Strategy for a category tree: each category's parent, if any, comes
/// earlier in the list. Ids are 1-based positions.
pub fn category_tree_strategy(max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(
        (category_name_strategy(), any::<prop::sample::Index>(), any::<bool>()),
        1..=max.max(1),
    )
    .prop_map(|specs| {
        let mut records: Vec<Record> = Vec::with_capacity(specs.len());
        for (position, (name, parent, nested)) in specs.into_iter().enumerate() {
            let id = position as u64 + 1;
            let record = if nested && position > 0 {
                let parent = &records[parent.index(position)];
                subcategory(id, &name, parent)
            } else {
                category(id, &name)
            };
            records.push(record);
        }
        records
    })
}
