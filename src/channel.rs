//! Named logical channels and resource binding
//!
//! A session is configured with an ordered list of channel names. As the
//! remote peer creates data channels and media streams during negotiation,
//! each inbound resource is matched by label against the configured names and
//! bound to the first free match. Unmatched and duplicate resources are closed
//! immediately.

use crate::negotiator::{RemoteResource, ResourceKind};
use log::{info, warn};
use std::sync::Arc;

/// A named channel slot, bound to at most one inbound resource.
pub struct Channel {
    pub name: String,
    /// Set at bind time from the matched resource.
    pub kind: Option<ResourceKind>,
    resource: Option<Arc<dyn RemoteResource>>,
}

impl Channel {
    fn new(name: String) -> Self {
        Self {
            name,
            kind: None,
            resource: None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.resource.is_some()
    }
}

/// Outcome of one binding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The resource was bound to a matching free channel
    Bound,
    /// No configured channel carries the resource's label
    NoMatch,
    /// The matching channel already holds a resource
    AlreadyBound,
}

/// Matches inbound resources to the configured channel set.
pub struct ChannelBinder {
    channels: Vec<Channel>,
}

impl ChannelBinder {
    pub fn new(names: &[String]) -> Self {
        Self {
            channels: names.iter().cloned().map(Channel::new).collect(),
        }
    }

    /// Bind an inbound resource to the channel whose name equals its label.
    ///
    /// Unmatched resources and second bindings to an occupied channel are
    /// closed immediately; the occupied channel keeps its first resource.
    pub fn bind(&mut self, resource: Arc<dyn RemoteResource>) -> BindOutcome {
        let label = resource.label();
        match self.channels.iter_mut().find(|c| c.name == label) {
            Some(channel) if channel.resource.is_none() => {
                channel.kind = Some(resource.kind());
                channel.resource = Some(resource);
                info!("Channel bound: {} ({:?})", label, channel.kind);
                BindOutcome::Bound
            }
            Some(_) => {
                warn!("Channel already bound, closing duplicate resource: {}", label);
                resource.close();
                BindOutcome::AlreadyBound
            }
            None => {
                warn!("No channel matches inbound resource, closing: {}", label);
                resource.close();
                BindOutcome::NoMatch
            }
        }
    }

    /// Close every bound resource and drop the whole channel set.
    pub fn release_all(&mut self) {
        for channel in &self.channels {
            if let Some(resource) = &channel.resource {
                resource.close();
            }
        }
        self.channels.clear();
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeResource {
        label: String,
        kind: ResourceKind,
        closed: AtomicBool,
    }

    impl FakeResource {
        fn data(label: &str) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_string(),
                kind: ResourceKind::Data,
                closed: AtomicBool::new(false),
            })
        }
    }

    impl RemoteResource for FakeResource {
        fn label(&self) -> String {
            self.label.clone()
        }

        fn kind(&self) -> ResourceKind {
            self.kind
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn binds_resource_to_matching_channel() {
        let mut binder = ChannelBinder::new(&names(&["control", "audio"]));
        let resource = FakeResource::data("control");

        assert_eq!(binder.bind(resource.clone()), BindOutcome::Bound);
        assert!(!resource.closed.load(Ordering::SeqCst));
        assert!(binder.channels()[0].is_bound());
        assert_eq!(binder.channels()[0].kind, Some(ResourceKind::Data));
        assert!(!binder.channels()[1].is_bound());
    }

    #[test]
    fn closes_unmatched_resource() {
        let mut binder = ChannelBinder::new(&names(&["control"]));
        let resource = FakeResource::data("telemetry");

        assert_eq!(binder.bind(resource.clone()), BindOutcome::NoMatch);
        assert!(resource.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn rejects_second_binding_and_keeps_first() {
        let mut binder = ChannelBinder::new(&names(&["control"]));
        let first = FakeResource::data("control");
        let second = FakeResource::data("control");

        assert_eq!(binder.bind(first.clone()), BindOutcome::Bound);
        assert_eq!(binder.bind(second.clone()), BindOutcome::AlreadyBound);
        assert!(!first.closed.load(Ordering::SeqCst));
        assert!(second.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn release_all_closes_bound_resources_and_clears_set() {
        let mut binder = ChannelBinder::new(&names(&["control", "audio"]));
        let resource = FakeResource::data("control");
        binder.bind(resource.clone());

        binder.release_all();
        assert!(resource.closed.load(Ordering::SeqCst));
        assert!(binder.channels().is_empty());
    }
}
