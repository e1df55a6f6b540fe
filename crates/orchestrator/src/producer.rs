//! Built-in work producers

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, Envelope, UrlTemplate, WorkItem, WorkProducer};
use tracing::{debug, error};
use url::Url;

use crate::error::{OrchestratorError, Result};

/// URLs of a [`UrlTemplate`], rendered one at a time
///
/// A clone continues from the same index. Nothing is rendered ahead of the
/// consumer, so memory does not grow with `count`.
///
/// ```
/// use contracts::UrlTemplate;
/// use orchestrator::TemplateUrls;
///
/// let template = UrlTemplate {
///     pattern: "https://picsum.photos/id/{i}/400/600".into(),
///     count: 2,
///     start: 1,
/// };
/// let urls: Vec<_> = TemplateUrls::new(&template).unwrap().collect();
/// assert_eq!(urls[1].as_str(), "https://picsum.photos/id/2/400/600");
/// ```
#[derive(Debug, Clone)]
pub struct TemplateUrls {
    pattern: Arc<str>,
    indices: Range<u64>,
}

impl TemplateUrls {
    /// Check the index range and both ends of it
    pub fn new(template: &UrlTemplate) -> Result<Self> {
        let indices = template.indices()?;
        if let (Some(first), Some(last)) = (indices.clone().next(), indices.clone().next_back()) {
            for index in [first, last] {
                let raw = template.render(index);
                Url::parse(&raw).map_err(|e| {
                    OrchestratorError::startup("source", format!("invalid URL '{raw}': {e}"))
                })?;
            }
        }
        Ok(Self {
            pattern: Arc::from(template.pattern.as_str()),
            indices,
        })
    }

    fn render(&self, index: u64) -> String {
        self.pattern.replace(UrlTemplate::PLACEHOLDER, &index.to_string())
    }
}

impl Iterator for TemplateUrls {
    type Item = Url;

    fn next(&mut self) -> Option<Url> {
        while let Some(index) = self.indices.next() {
            let raw = self.render(index);
            match Url::parse(&raw) {
                Ok(url) => return Some(url),
                Err(e) => error!(url = %raw, error = %e, "Template URL is invalid, not produced"),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.indices.size_hint().1)
    }
}

/// Yields a fixed list once
pub struct ListProducer<I> {
    name: String,
    items: VecDeque<I>,
}

impl<I> ListProducer<I> {
    pub fn new(name: impl Into<String>, items: impl IntoIterator<Item = I>) -> Self {
        Self {
            name: name.into(),
            items: items.into_iter().collect(),
        }
    }
}

impl<I: WorkItem> WorkProducer<I> for ListProducer<I> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_item(&mut self) -> std::result::Result<Envelope<I>, ContractError> {
        Ok(match self.items.pop_front() {
            Some(item) => Envelope::Item(item),
            None => Envelope::EndOfStream,
        })
    }
}

/// Replays a source `rounds` times, pausing `interval` between items
///
/// Models a polling source: the same item shows up again in the next round,
/// which is what consecutive-duplicate suppression is for. The source is
/// cloned at the start of every round and pulled one item at a time, so a
/// generated source is never materialised.
pub struct IntervalProducer<S> {
    name: String,
    source: S,
    pass: S,
    interval: Duration,
    rounds: u32,
    round: u32,
    emitted: u64,
}

impl<S: Iterator + Clone> IntervalProducer<S> {
    pub fn new(
        name: impl Into<String>,
        items: impl IntoIterator<IntoIter = S>,
        interval: Duration,
        rounds: u32,
    ) -> Self {
        let source = items.into_iter();
        Self {
            name: name.into(),
            pass: source.clone(),
            source,
            interval,
            rounds,
            round: 0,
            emitted: 0,
        }
    }

    /// Items produced so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl<I, S> WorkProducer<I> for IntervalProducer<S>
where
    I: WorkItem,
    S: Iterator<Item = I> + Clone + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_item(&mut self) -> std::result::Result<Envelope<I>, ContractError> {
        let item = loop {
            if self.round >= self.rounds {
                return Ok(Envelope::EndOfStream);
            }
            match self.pass.next() {
                Some(item) => break item,
                // An empty source stays empty in every round
                None if self.emitted == 0 => self.round = self.rounds,
                None => {
                    self.round += 1;
                    self.pass = self.source.clone();
                }
            }
        };

        if self.emitted > 0 && !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }

        self.emitted += 1;
        debug!(producer = %self.name, round = self.round, item = %item, "Produced item");
        Ok(Envelope::Item(item))
    }
}
