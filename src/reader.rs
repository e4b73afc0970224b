use std::sync::Arc;

use log::debug;
use once_cell::sync::OnceCell;

use crate::err::{Result, TdhError};
use crate::event::{self, Event, EventDescriptor};
use crate::memo::Memo;
use crate::negotiate::negotiate_buffer;
use crate::provider::{self, Provider};
use crate::source::MetadataSource;

/// Decodes provider/event schema metadata from a [`MetadataSource`].
///
/// Both entry points are pure functions of their inputs and are memoized for
/// the lifetime of the reader: repeated calls trigger at most one underlying
/// query per input, with concurrent first callers sharing a single in-flight
/// query. Metadata is assumed static for that lifetime, so nothing is ever
/// re-fetched — including failures, which are replayed to later callers
/// as-is. A caller that wants a fresh attempt constructs a new reader.
#[derive(Debug)]
pub struct TdhReader<S> {
    source: S,
    providers: OnceCell<Result<Arc<[Provider]>>>,
    events_by_provider: Memo<String, Result<Arc<[Event]>>>,
}

impl<S: MetadataSource> TdhReader<S> {
    pub fn new(source: S) -> Self {
        TdhReader {
            source,
            providers: OnceCell::new(),
            events_by_provider: Memo::new(),
        }
    }

    /// The underlying metadata source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// All providers registered with the metadata source, in source order.
    pub fn providers(&self) -> Result<Arc<[Provider]>> {
        self.providers
            .get_or_init(|| self.enumerate_providers_uncached())
            .clone()
    }

    /// All events of a manifest provider, one entry per (id, version) pair.
    ///
    /// Providers are decoded independently: a malformed provider only fails
    /// calls for its own GUID.
    pub fn provider_events(&self, provider_guid: &str) -> Result<Arc<[Event]>> {
        self.events_by_provider
            .get_or_compute(&provider_guid.to_string(), || {
                self.enumerate_events_uncached(provider_guid)
            })
    }

    fn enumerate_providers_uncached(&self) -> Result<Arc<[Provider]>> {
        debug!("enumerating registered providers");

        let buffer = negotiate_buffer("enumerate_providers", |buf, size| {
            self.source.enumerate_providers(buf, size)
        })?;
        let providers = provider::parse_provider_enumeration(&buffer)?;

        debug!("decoded {} providers", providers.len());
        Ok(providers.into())
    }

    fn enumerate_events_uncached(&self, provider_guid: &str) -> Result<Arc<[Event]>> {
        debug!("enumerating events for provider {provider_guid}");

        let buffer = negotiate_buffer("enumerate_events", |buf, size| {
            self.source.enumerate_events(provider_guid, buf, size)
        })
        .map_err(|source| provider_error(provider_guid, source))?;
        let descriptors = event::parse_event_enumeration(&buffer)
            .map_err(|source| provider_error(provider_guid, source))?;

        let mut events = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let event = self
                .decode_event(provider_guid, &descriptor)
                .map_err(|source| event_error(provider_guid, &descriptor, source))?;
            events.push(event);
        }

        debug!("decoded {} events for provider {provider_guid}", events.len());
        Ok(events.into())
    }

    fn decode_event(&self, provider_guid: &str, descriptor: &EventDescriptor) -> Result<Event> {
        let buffer = negotiate_buffer("get_event_detail", |buf, size| {
            self.source.event_detail(provider_guid, descriptor, buf, size)
        })?;
        event::parse_event_detail(provider_guid, &buffer)
    }
}

fn provider_error(guid: &str, source: TdhError) -> TdhError {
    TdhError::Provider {
        guid: guid.to_string(),
        source: Box::new(source),
    }
}

fn event_error(guid: &str, descriptor: &EventDescriptor, source: TdhError) -> TdhError {
    TdhError::Event {
        provider: guid.to_string(),
        id: descriptor.id,
        version: descriptor.version,
        source: Box::new(source),
    }
}
