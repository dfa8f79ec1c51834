//! Operator library built on the runtime contract.
//!
//! Every operator here has a unique checkpoint name (see [`catalog`]) and
//! follows the same shape: a stage type implementing [`Subscribable`] that
//! builds one operator per subscription, and the operator itself
//! implementing [`Operator`](crate::subscription::Operator) plus
//! [`Observer`](crate::subscription::Observer) for each input.
//!
//! ```ignore
//! let sum = source.aggregate(|acc, x| Ok(acc + x));
//! let sampled = source.sample(50)?;
//! ```

mod aggregate;
mod buffer;
mod count;
mod filter;
mod finally;
mod scan;
mod sample;
mod select;
mod sequence_equal;
mod to_list;

pub use aggregate::{Aggregate, AggregateSeed};
pub use buffer::Buffer;
pub use count::Count;
pub use filter::Filter;
pub use finally::Finally;
pub use sample::{Sample, SampleWith};
pub use scan::{Scan, ScanSeed};
pub use select::Select;
pub use sequence_equal::SequenceEqual;
pub use to_list::ToList;

use crate::codec::Persist;
use crate::error::{Result, SequenceError, SequenceResult};
use crate::subscription::{Downstream, OperatorCore, Subscribable};
use crate::types::{Tick, Value, Version};
use std::sync::Arc;

/// Projection function.
pub type Selector<T, R> = Arc<dyn Fn(T) -> SequenceResult<R> + Send + Sync>;

/// Filter predicate.
pub type Predicate<T> = Arc<dyn Fn(&T) -> SequenceResult<bool> + Send + Sync>;

/// Folding function.
pub type Accumulator<A, T> = Arc<dyn Fn(A, T) -> SequenceResult<A> + Send + Sync>;

/// Element comparer.
pub type Comparer<T> = Arc<dyn Fn(&T, &T) -> SequenceResult<bool> + Send + Sync>;

/// Checkpoint name and state version of every operator in the library.
pub fn catalog() -> Vec<(&'static str, Version)> {
    vec![
        (select::NAME, select::VERSION),
        (filter::NAME, filter::VERSION),
        (scan::NAME, scan::VERSION),
        (scan::SEED_NAME, scan::SEED_VERSION),
        (aggregate::NAME, aggregate::VERSION),
        (aggregate::SEED_NAME, aggregate::SEED_VERSION),
        (aggregate::SEED_RESULT_NAME, aggregate::SEED_VERSION),
        (count::NAME, count::VERSION),
        (sample::PERIOD_NAME, sample::PERIOD_VERSION),
        (sample::SAMPLER_NAME, sample::SAMPLER_VERSION),
        (buffer::NAME, buffer::VERSION),
        (to_list::NAME, to_list::VERSION),
        (sequence_equal::NAME, sequence_equal::VERSION),
        (finally::NAME, finally::VERSION),
    ]
}

/// Forward an error downstream, then dispose the operator's subscription.
pub(crate) fn fail<T>(core: &OperatorCore, downstream: &Downstream<T>, error: SequenceError) {
    downstream.error(error);
    core.dispose_subscription();
}

/// Forward completion downstream, then dispose the operator's subscription.
pub(crate) fn complete<T>(core: &OperatorCore, downstream: &Downstream<T>) {
    downstream.completed();
    core.dispose_subscription();
}

/// Combinators available on every subscribable.
pub trait SubscribableExt<T: Value>: Subscribable<T> + Sized + 'static {
    fn select<R, F>(self, selector: F) -> Select<T, R>
    where
        R: Value,
        F: Fn(T) -> SequenceResult<R> + Send + Sync + 'static,
    {
        Select::new(Arc::new(self), Arc::new(selector))
    }

    fn filter<F>(self, predicate: F) -> Filter<T>
    where
        F: Fn(&T) -> SequenceResult<bool> + Send + Sync + 'static,
    {
        Filter::new(Arc::new(self), Arc::new(predicate))
    }

    /// Running fold; the first element seeds the accumulator.
    fn scan<F>(self, accumulator: F) -> Scan<T>
    where
        T: Persist,
        F: Fn(T, T) -> SequenceResult<T> + Send + Sync + 'static,
    {
        Scan::new(Arc::new(self), Arc::new(accumulator))
    }

    fn scan_seed<A, F>(self, seed: A, accumulator: F) -> ScanSeed<T, A>
    where
        A: Value + Persist,
        F: Fn(A, T) -> SequenceResult<A> + Send + Sync + 'static,
    {
        ScanSeed::new(Arc::new(self), seed, Arc::new(accumulator))
    }

    /// Fold to a single value; fails with `EmptySequence` on an empty source.
    fn aggregate<F>(self, accumulator: F) -> Aggregate<T>
    where
        T: Persist,
        F: Fn(T, T) -> SequenceResult<T> + Send + Sync + 'static,
    {
        Aggregate::new(Arc::new(self), Arc::new(accumulator))
    }

    fn aggregate_seed<A, F>(self, seed: A, accumulator: F) -> AggregateSeed<T, A, A>
    where
        A: Value + Persist,
        F: Fn(A, T) -> SequenceResult<A> + Send + Sync + 'static,
    {
        AggregateSeed::new(Arc::new(self), seed, Arc::new(accumulator))
    }

    fn aggregate_seed_result<A, R, F, G>(
        self,
        seed: A,
        accumulator: F,
        result: G,
    ) -> AggregateSeed<T, A, R>
    where
        A: Value + Persist,
        R: Value,
        F: Fn(A, T) -> SequenceResult<A> + Send + Sync + 'static,
        G: Fn(A) -> SequenceResult<R> + Send + Sync + 'static,
    {
        AggregateSeed::with_result(Arc::new(self), seed, Arc::new(accumulator), Arc::new(result))
    }

    fn count(self) -> Count<T> {
        Count::new(Arc::new(self))
    }

    /// Emit the latest value once per `period` ticks.
    fn sample(self, period: Tick) -> Result<Sample<T>>
    where
        T: Persist,
    {
        Sample::new(Arc::new(self), period)
    }

    /// Emit the latest value whenever `sampler` produces an element.
    fn sample_with<U, S>(self, sampler: S) -> SampleWith<T, U>
    where
        T: Persist,
        U: Value,
        S: Subscribable<U> + 'static,
    {
        SampleWith::new(Arc::new(self), Arc::new(sampler))
    }

    /// Non-overlapping buffers of `count` elements.
    fn buffer(self, count: usize) -> Result<Buffer<T>>
    where
        T: Persist,
    {
        Buffer::new(Arc::new(self), count, count)
    }

    /// Buffers of `count` elements, a new one opening every `skip` elements.
    fn buffer_skip(self, count: usize, skip: usize) -> Result<Buffer<T>>
    where
        T: Persist,
    {
        Buffer::new(Arc::new(self), count, skip)
    }

    fn to_list(self) -> ToList<T>
    where
        T: Persist,
    {
        ToList::new(Arc::new(self))
    }

    fn sequence_equal<S>(self, other: S) -> SequenceEqual<T>
    where
        T: Persist + PartialEq,
        S: Subscribable<T> + 'static,
    {
        SequenceEqual::new(Arc::new(self), Arc::new(other), Arc::new(|a: &T, b: &T| Ok::<_, SequenceError>(a == b)))
    }

    fn sequence_equal_by<S, F>(self, other: S, comparer: F) -> SequenceEqual<T>
    where
        T: Persist,
        S: Subscribable<T> + 'static,
        F: Fn(&T, &T) -> SequenceResult<bool> + Send + Sync + 'static,
    {
        SequenceEqual::new(Arc::new(self), Arc::new(other), Arc::new(comparer))
    }

    /// Run `action` once when the subscription is disposed, however it ends.
    fn finally<F>(self, action: F) -> Finally<T>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Finally::new(Arc::new(self), Arc::new(action))
    }
}

impl<T: Value, S: Subscribable<T> + 'static> SubscribableExt<T> for S {}
