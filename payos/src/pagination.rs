//! Lazy pagination over list endpoints.
//!
//! A [`Page`] carries one page of items, its [`Pagination`] metadata and a
//! [`Cursor`] able to fetch the following page. The cursor moves the offset
//! through a caller-supplied `advance` function `(params, offset) -> params`,
//! so any parameter type can be paged without field introspection.
//!
//! [`PageIterator`] walks pages on demand:
//!
//! ```text
//! BeforeStart -> (fetch first) -> Within -> (exhausted) -> Within | Done | Errored
//! ```
//!
//! Termination is permanent. After a fetch error the iterator keeps returning
//! `None` while the error stays available through [`PageIterator::err`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;

use crate::error::Error;
use crate::proto::Pagination;

/// A pinned, boxed, `Send` future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fetches the page described by `P`.
pub type FetchFn<T, P> =
    Arc<dyn Fn(P) -> BoxFuture<'static, Result<Page<T, P>, Error>> + Send + Sync>;

/// Returns `params` moved to the given offset.
pub type AdvanceFn<P> = Arc<dyn Fn(P, u64) -> P + Send + Sync>;

/// The parameters of a page plus the capability to fetch its successor.
pub struct Cursor<T, P> {
    params: P,
    fetch: FetchFn<T, P>,
    advance: AdvanceFn<P>,
}

impl<T, P: Clone> Clone for Cursor<T, P> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            fetch: Arc::clone(&self.fetch),
            advance: Arc::clone(&self.advance),
        }
    }
}

impl<T, P: fmt::Debug> fmt::Debug for Cursor<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl<T, P> Cursor<T, P> {
    /// Creates a cursor from parameters, a fetch function and an offset setter.
    pub fn new<F, Fut, A>(params: P, fetch: F, advance: A) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T, P>, Error>> + Send + 'static,
        A: Fn(P, u64) -> P + Send + Sync + 'static,
    {
        let fetch: FetchFn<T, P> = Arc::new(
            move |params| -> BoxFuture<'static, Result<Page<T, P>, Error>> {
                Box::pin(fetch(params))
            },
        );
        Self {
            params,
            fetch,
            advance: Arc::new(advance),
        }
    }

    /// Same cursor with different parameters.
    #[must_use]
    pub fn with_params(self, params: P) -> Self {
        Self { params, ..self }
    }

    /// Parameters of the page this cursor describes.
    pub const fn params(&self) -> &P {
        &self.params
    }

    /// Fetches the page described by the current parameters.
    ///
    /// # Errors
    ///
    /// Propagates the fetch function's error.
    pub async fn fetch(self) -> Result<Page<T, P>, Error> {
        (self.fetch)(self.params).await
    }

    fn at_offset(self, offset: u64) -> Self {
        let params = (self.advance)(self.params, offset);
        Self { params, ..self }
    }
}

/// One page of list results.
pub struct Page<T, P> {
    /// Items in this page.
    pub data: Vec<T>,
    /// Pagination metadata reported by the server.
    pub pagination: Pagination,
    cursor: Cursor<T, P>,
}

impl<T: fmt::Debug, P: fmt::Debug> fmt::Debug for Page<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("data", &self.data)
            .field("pagination", &self.pagination)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl<T, P> Page<T, P> {
    /// Creates a page. `cursor` must hold the parameters that produced it.
    pub const fn new(data: Vec<T>, pagination: Pagination, cursor: Cursor<T, P>) -> Self {
        Self {
            data,
            pagination,
            cursor,
        }
    }

    /// Parameters that produced this page.
    pub const fn params(&self) -> &P {
        self.cursor.params()
    }

    /// Whether the server reported another page.
    pub const fn has_next_page(&self) -> bool {
        self.pagination.has_more
    }

    /// Consumes the page, returning its items.
    pub fn into_data(self) -> Vec<T> {
        self.data
    }
}

impl<T, P: Clone> Page<T, P> {
    /// Parameters for the following page, advanced by this page's `count`.
    pub fn next_page_params(&self) -> Option<P> {
        self.has_next_page().then(|| {
            (self.cursor.advance)(self.cursor.params.clone(), self.pagination.next_offset())
        })
    }

    /// Fetches the following page, or `None` if this is the last one.
    ///
    /// # Errors
    ///
    /// Propagates the fetch function's error.
    pub async fn next_page(&self) -> Result<Option<Self>, Error> {
        if !self.has_next_page() {
            return Ok(None);
        }
        let cursor = self.cursor.clone().at_offset(self.pagination.next_offset());
        cursor.fetch().await.map(Some)
    }
}

struct Current<T, P> {
    items: std::vec::IntoIter<T>,
    pagination: Pagination,
    cursor: Cursor<T, P>,
}

impl<T, P> From<Page<T, P>> for Current<T, P> {
    fn from(page: Page<T, P>) -> Self {
        Self {
            items: page.data.into_iter(),
            pagination: page.pagination,
            cursor: page.cursor,
        }
    }
}

enum State<T, P> {
    BeforeStart(Cursor<T, P>),
    Within(Current<T, P>),
    Done,
    Errored,
}

/// Single-owner cursor yielding items across page boundaries.
pub struct PageIterator<T, P> {
    state: State<T, P>,
    error: Option<Error>,
}

impl<T, P> fmt::Debug for PageIterator<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::BeforeStart(_) => "before_start",
            State::Within(_) => "within_page",
            State::Done => "done",
            State::Errored => "errored",
        };
        f.debug_struct("PageIterator")
            .field("state", &state)
            .field("error", &self.error)
            .finish()
    }
}

impl<T, P> PageIterator<T, P> {
    /// Creates an iterator that fetches its first page from `cursor`.
    pub const fn new(cursor: Cursor<T, P>) -> Self {
        Self {
            state: State::BeforeStart(cursor),
            error: None,
        }
    }

    /// Creates an iterator that starts inside an already fetched page.
    pub fn from_page(page: Page<T, P>) -> Self {
        Self {
            state: State::Within(page.into()),
            error: None,
        }
    }

    /// The error that terminated iteration, if any.
    pub const fn err(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Whether iteration has terminated.
    pub const fn is_finished(&self) -> bool {
        matches!(self.state, State::Done | State::Errored)
    }

    /// Yields the next item, fetching the next page when the current one is
    /// exhausted. Returns `None` once the listing is exhausted or a fetch
    /// failed.
    ///
    /// If the returned future is dropped while a page is being fetched the
    /// iterator is left finished with [`Error::Cancelled`] as its error.
    pub async fn advance(&mut self) -> Option<T> {
        let cursor = match std::mem::replace(&mut self.state, State::Done) {
            State::Done => return None,
            State::Errored => {
                self.state = State::Errored;
                return None;
            }
            State::BeforeStart(cursor) => cursor,
            State::Within(mut current) => {
                if let Some(item) = current.items.next() {
                    self.state = State::Within(current);
                    return Some(item);
                }
                if !current.pagination.has_more {
                    return None;
                }
                let offset = current.pagination.next_offset();
                #[cfg(feature = "telemetry")]
                tracing::debug!(offset, "fetching next page");
                current.cursor.at_offset(offset)
            }
        };

        self.state = State::Errored;
        self.error = Some(Error::Cancelled);
        let fetched = cursor.fetch().await;
        self.error = None;
        self.state = State::Done;
        match fetched {
            Ok(page) => {
                let mut current = Current::from(page);
                let first = current.items.next();
                if first.is_some() {
                    self.state = State::Within(current);
                }
                first
            }
            Err(err) => {
                self.error = Some(err);
                self.state = State::Errored;
                None
            }
        }
    }

    /// Drains the remaining items into a vector.
    ///
    /// # Errors
    ///
    /// Returns the fetch error that terminated iteration, if any.
    pub async fn collect_all(mut self) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        while let Some(item) = self.advance().await {
            items.push(item);
        }
        self.error.map_or(Ok(items), Err)
    }

    /// Adapts the iterator into a stream. A terminating error is yielded once
    /// as the final element.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, Error>> {
        futures_util::stream::unfold(self, |mut iter| async move {
            match iter.advance().await {
                Some(item) => Some((Ok(item), iter)),
                None => iter.error.take().map(|err| (Err(err), iter)),
            }
        })
    }
}
