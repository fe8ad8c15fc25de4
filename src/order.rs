use crate::model::{DatedItem, OrderedEntry, OrderedOutput};

/// Sort newest first and mark where each new date group starts.
///
/// The sort is stable, so listings sharing a date keep their encounter order.
/// The first entry never carries a boundary.
pub fn order(mut items: Vec<DatedItem>) -> OrderedOutput {
    items.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));

    let mut previous: Option<String> = None;
    let entries = items
        .into_iter()
        .map(|item| {
            let is_date_boundary = previous.as_ref().is_some_and(|prev| *prev != item.date_key);
            previous = Some(item.date_key.clone());
            OrderedEntry {
                identity: item.identity,
                date_key: item.date_key,
                is_date_boundary,
                payload: item.payload,
            }
        })
        .collect();

    OrderedOutput { entries }
}
