//! Offset pagination for child listings.

use tracing::debug;

use crate::error::TransportError;

/// Page size for child listings.
pub const CHILDREN_PAGE_SIZE: usize = 100;

/// Collect every item of an offset-paginated listing.
///
/// `fetch(start, limit)` returns one page of results together with the total
/// size reported by the server. Requests are issued at `start = 0, P, 2P, …`
/// and results are accumulated in arrival order until the accumulated count
/// reaches the reported total. An empty page before that point means the
/// listing is inconsistent and is reported as an error.
pub fn collect_paginated<T, F>(page_size: usize, mut fetch: F) -> Result<Vec<T>, TransportError>
where
    F: FnMut(usize, usize) -> Result<(Vec<T>, usize), TransportError>,
{
    let page_size = page_size.max(1);
    let mut items = Vec::new();
    let mut start = 0;

    loop {
        let (batch, total) = fetch(start, page_size)?;
        let received = batch.len();
        items.extend(batch);

        if items.len() >= total {
            return Ok(items);
        }
        if received == 0 {
            return Err(TransportError::unknown(
                format!(
                    "listing ended after {} of {total} items at offset {start}",
                    items.len()
                ),
                None,
            ));
        }

        debug!("Fetched {} of {total} items, continuing", items.len());
        start += page_size;
    }
}
