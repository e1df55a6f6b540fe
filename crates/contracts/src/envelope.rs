//! Envelope - explicit end-of-stream tagging for stage queues

use std::fmt;

/// Marker trait for values that can travel through a stage queue as work.
///
/// Work items are immutable once enqueued and must be comparable for
/// equality so consecutive duplicates can be suppressed. `Display` is used
/// for log fields and failure records.
pub trait WorkItem:
    Clone + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

impl<T> WorkItem for T where
    T: Clone + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

/// A value dequeued from a stage queue (or produced by a producer).
///
/// End-of-stream is a distinct variant, never a nullable item, so a
/// legitimately empty item can not be mistaken for termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<T> {
    /// A unit of work
    Item(T),
    /// No further items will arrive from this source
    EndOfStream,
}

impl<T> Envelope<T> {
    /// Check if this is the end-of-stream marker
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }

    /// Convert into the contained item, if any
    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Item(item) => Some(item),
            Self::EndOfStream => None,
        }
    }
}

impl<T> From<Option<T>> for Envelope<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(item) => Self::Item(item),
            None => Self::EndOfStream,
        }
    }
}
