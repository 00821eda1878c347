//! Paginated, filterable collections over remote list endpoints.
//!
//! The collection holds a materialized prefix of the server's ordering (most recent
//! first). `offset` is the number of materialized items and is the offset of the
//! next page. Loads must be serialized by the caller; a page that arrives after the
//! filter was replaced or the collection was cleared is discarded.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::EntityId;
use crate::ports::{PortError, PortResult};

/// Page length used when the caller does not pick one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Anything with a stable server id.
pub trait Identified {
    fn id(&self) -> EntityId;
}

impl<T: Identified> Identified for Arc<T> {
    fn id(&self) -> EntityId {
        (**self).id()
    }
}

/// Query sent to list endpoints.
///
/// The server rejects a filter text without `filterIsActive` and the reverse, so
/// the two are only ever set together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub filter_is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_text: Option<String>,
    pub offset: usize,
    pub count: usize,
}

impl PageQuery {
    pub fn new(offset: usize, count: usize, filter: &str) -> Self {
        let filter_text = (!filter.is_empty()).then(|| filter.to_string());
        Self {
            filter_is_active: filter_text.is_some(),
            filter_text,
            offset,
            count,
        }
    }
}

type PageFetcher<T> = Arc<dyn Fn(PageQuery) -> BoxFuture<'static, PortResult<Vec<T>>> + Send + Sync>;
type ItemFetcher<T> = Arc<dyn Fn(EntityId) -> BoxFuture<'static, PortResult<T>> + Send + Sync>;

struct Source<T> {
    page: PageFetcher<T>,
    item: ItemFetcher<T>,
}

struct PagedState<T> {
    items: Vec<T>,
    filter: String,
    exhausted: bool,
    realized: bool,
    /// Bumped by `set_filter` and `clear` so stale pages can be recognised.
    epoch: u64,
}

pub struct Paged<T> {
    page_size: usize,
    source: Option<Source<T>>,
    state: Mutex<PagedState<T>>,
}

impl<T> Paged<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    /// Wraps a list endpoint (`fetch_page`) and its by-id counterpart
    /// (`fetch_item`). Nothing is fetched until the first load.
    pub fn new<P, PFut, I, IFut>(page_size: usize, fetch_page: P, fetch_item: I) -> Self
    where
        P: Fn(PageQuery) -> PFut + Send + Sync + 'static,
        PFut: Future<Output = PortResult<Vec<T>>> + Send + 'static,
        I: Fn(EntityId) -> IFut + Send + Sync + 'static,
        IFut: Future<Output = PortResult<T>> + Send + 'static,
    {
        Self {
            page_size: page_size.max(1),
            source: Some(Source {
                page: Arc::new(move |query| fetch_page(query).boxed()),
                item: Arc::new(move |id| fetch_item(id).boxed()),
            }),
            state: Mutex::new(PagedState {
                items: Vec::new(),
                filter: String::new(),
                exhausted: false,
                realized: false,
                epoch: 0,
            }),
        }
    }

    /// A collection that is known to be empty and has no remote source.
    pub fn empty() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            source: None,
            state: Mutex::new(PagedState {
                items: Vec::new(),
                filter: String::new(),
                exhausted: true,
                realized: true,
                epoch: 0,
            }),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// True once a load succeeded, until the next `clear()`.
    pub fn is_realized(&self) -> bool {
        self.state.lock().realized
    }

    pub fn has_more(&self) -> bool {
        !self.state.lock().exhausted
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of the next page; always equal to the number of materialized items.
    pub fn offset(&self) -> usize {
        self.len()
    }

    pub fn filter(&self) -> String {
        self.state.lock().filter.clone()
    }

    /// Snapshot of the materialized prefix.
    pub fn items(&self) -> Vec<T> {
        self.state.lock().items.clone()
    }

    /// Fetches the next page and appends it. Returns how many items were added.
    pub async fn load_next(&self) -> PortResult<usize> {
        self.load_next_inner(None).await
    }

    /// Like [`Paged::load_next`]; on cancellation the offset and the end-of-list
    /// flag stay as they were.
    pub async fn load_next_cancellable(&self, cancel: &CancellationToken) -> PortResult<usize> {
        self.load_next_inner(Some(cancel)).await
    }

    /// Drops everything materialized, switches to `filter` and loads its first page.
    pub async fn set_filter(&self, filter: &str) -> PortResult<usize> {
        self.reset(filter);
        self.load_next_inner(None).await
    }

    pub async fn set_filter_cancellable(
        &self,
        filter: &str,
        cancel: &CancellationToken,
    ) -> PortResult<usize> {
        self.reset(filter);
        self.load_next_inner(Some(cancel)).await
    }

    /// Drops items and filter without fetching.
    pub fn clear(&self) {
        if self.source.is_none() {
            return;
        }
        self.reset("");
    }

    /// Puts an item the caller knows was just created at the head. No server call.
    /// Returns `false` if an item with the same id is already materialized.
    pub fn insert_head(&self, item: T) -> bool {
        let mut state = self.state.lock();
        if state.items.iter().any(|existing| existing.id() == item.id()) {
            return false;
        }
        state.items.insert(0, item);
        true
    }

    /// Fetches one item by id and puts it at the head, for items the server
    /// reported as new. Returns `false` when the id is already materialized.
    pub async fn append(&self, id: EntityId) -> PortResult<bool> {
        let Some(source) = &self.source else {
            return Ok(false);
        };
        if self.find_by_id(id).is_some() {
            return Ok(false);
        }
        let epoch = self.state.lock().epoch;
        let item = (source.item)(id).await?;
        let mut state = self.state.lock();
        if state.epoch != epoch || state.items.iter().any(|existing| existing.id() == id) {
            return Ok(false);
        }
        state.items.insert(0, item);
        Ok(true)
    }

    pub fn at(&self, index: usize) -> PortResult<T> {
        let state = self.state.lock();
        state.items.get(index).cloned().ok_or(PortError::OutOfRange {
            index,
            len: state.items.len(),
        })
    }

    /// Items in `start..end` of the materialized prefix.
    pub fn range(&self, start: usize, end: usize) -> PortResult<Vec<T>> {
        let state = self.state.lock();
        let len = state.items.len();
        if end > len {
            return Err(PortError::OutOfRange { index: end, len });
        }
        if start > end {
            return Err(PortError::OutOfRange { index: start, len });
        }
        Ok(state.items[start..end].to_vec())
    }

    /// Linear scan of the materialized prefix. Never fetches.
    pub fn find_by_id(&self, id: EntityId) -> Option<T> {
        self.state
            .lock()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    fn reset(&self, filter: &str) {
        let mut state = self.state.lock();
        state.items.clear();
        state.filter = filter.to_string();
        state.exhausted = false;
        state.realized = false;
        state.epoch += 1;
    }

    async fn load_next_inner(&self, cancel: Option<&CancellationToken>) -> PortResult<usize> {
        let Some(source) = &self.source else {
            return Ok(0);
        };
        let (query, epoch) = {
            let state = self.state.lock();
            if state.exhausted {
                return Ok(0);
            }
            (
                PageQuery::new(state.items.len(), self.page_size, &state.filter),
                state.epoch,
            )
        };
        let offset = query.offset;
        let fetch = (source.page)(query);
        let page = match cancel {
            Some(cancel) => tokio::select! {
                page = fetch => page?,
                _ = cancel.cancelled() => return Err(PortError::Cancelled),
            },
            None => fetch.await?,
        };

        let mut state = self.state.lock();
        if state.epoch != epoch {
            debug!("Discarding page at offset {} fetched before a reset", offset);
            return Ok(0);
        }
        let fetched = page.len();
        let before = state.items.len();
        for item in page {
            if !state.items.iter().any(|existing| existing.id() == item.id()) {
                state.items.push(item);
            }
        }
        if fetched < self.page_size {
            state.exhausted = true;
        }
        state.realized = true;
        Ok(state.items.len() - before)
    }
}

impl<T> fmt::Debug for Paged<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Paged")
            .field("len", &state.items.len())
            .field("filter", &state.filter)
            .field("exhausted", &state.exhausted)
            .field("realized", &state.realized)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
