//! Reference-counted cache of GPU entries
//!
//! Maps descriptor identity to one entry plus a reference count. Entries are
//! created on the first reference and evicted on the last release. Evicted
//! entries move to a retire list until the backend can destroy them.

use super::backend::GraphicsBackend;
use super::descriptor::{identity, Descriptor, ResourceError, ResourceKind};
use super::entry::{GpuEntry, ResourceEntry};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

struct Resource<D, E> {
    // Keeps the identity key valid while cached
    descriptor: Arc<D>,
    entry: Option<Arc<E>>,
    refcount: usize,
}

/// Result of releasing one reference
#[derive(Debug)]
pub enum Release<E> {
    /// Still referenced; carries the remaining count
    Retained(usize),
    /// Last reference dropped; carries the evicted entry if one was created
    Evicted(Option<Arc<E>>),
    /// The descriptor was not in the cache
    Unknown,
}

/// Cache for one resource kind
pub struct ResourceCache<D, E = GpuEntry<D>> {
    kind: ResourceKind,
    resources: HashMap<usize, Resource<D, E>>,
    retired: Vec<Arc<E>>,
}

impl<D: Descriptor, E: ResourceEntry> ResourceCache<D, E> {
    pub fn new() -> Self {
        Self {
            kind: D::KIND,
            resources: HashMap::new(),
            retired: Vec::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Add a reference, creating the entry with `create` on first use
    ///
    /// A failed creation is logged and cached as `None`; the reference still
    /// counts so that releases stay balanced.
    pub fn acquire_with(
        &mut self,
        descriptor: &Arc<D>,
        create: impl FnOnce(&Arc<D>) -> Result<E, ResourceError>,
    ) -> Option<Arc<E>> {
        let kind = self.kind;
        let resource = self
            .resources
            .entry(identity(descriptor))
            .or_insert_with(|| {
                let entry = match create(descriptor) {
                    Ok(entry) => {
                        debug!(kind = %kind, name = descriptor.label(), id = %entry.id(), "Created GPU entry");
                        Some(Arc::new(entry))
                    }
                    Err(err) => {
                        error!(kind = %kind, name = descriptor.label(), error = %err, "Failed to create GPU entry");
                        None
                    }
                };
                Resource {
                    descriptor: Arc::clone(descriptor),
                    entry,
                    refcount: 0,
                }
            });
        resource.refcount += 1;
        resource.entry.clone()
    }

    /// Drop a reference, evicting the entry when it was the last one
    pub fn release(&mut self, descriptor: &Arc<D>) -> Release<E> {
        let key = identity(descriptor);
        let Some(resource) = self.resources.get_mut(&key) else {
            warn!(kind = %self.kind, name = descriptor.label(), "Released a descriptor that is not cached");
            return Release::Unknown;
        };

        resource.refcount -= 1;
        if resource.refcount > 0 {
            return Release::Retained(resource.refcount);
        }

        let Some(resource) = self.resources.remove(&key) else {
            return Release::Unknown;
        };
        debug!(kind = %self.kind, name = resource.descriptor.label(), "Last reference released, evicting");
        if let Some(entry) = &resource.entry {
            self.retired.push(Arc::clone(entry));
        }
        Release::Evicted(resource.entry)
    }

    /// Entry for `descriptor` if cached and created successfully
    pub fn get(&self, descriptor: &Arc<D>) -> Option<Arc<E>> {
        self.resources
            .get(&identity(descriptor))
            .and_then(|resource| resource.entry.clone())
    }

    /// Current reference count, zero when not cached
    pub fn refcount(&self, descriptor: &Arc<D>) -> usize {
        self.resources
            .get(&identity(descriptor))
            .map_or(0, |resource| resource.refcount)
    }

    /// Number of cached descriptors, including failed ones
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Successfully created entries
    pub fn entries(&self) -> impl Iterator<Item = &Arc<E>> {
        self.resources
            .values()
            .filter_map(|resource| resource.entry.as_ref())
    }

    /// Entries waiting for backend teardown
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Destroy retired entries that nothing else references
    ///
    /// Entries still held elsewhere (typically by a frame in flight) stay on
    /// the retire list for a later pass. Entries that never reached the GPU
    /// are dropped without a backend call. Returns the number destroyed.
    pub fn collect_garbage(&mut self, backend: &mut dyn GraphicsBackend) -> usize {
        let kind = self.kind;
        let mut destroyed = 0;
        self.retired.retain(|entry| {
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            if entry.is_resident() {
                backend.destroy(kind, entry.id());
                destroyed += 1;
            }
            false
        });
        destroyed
    }
}

impl<D: Descriptor> ResourceCache<D, GpuEntry<D>> {
    /// Add a reference, creating a plain entry on first use
    pub fn acquire(&mut self, descriptor: &Arc<D>) -> Option<Arc<GpuEntry<D>>> {
        self.acquire_with(descriptor, GpuEntry::create)
    }
}

impl<D: Descriptor, E: ResourceEntry> Default for ResourceCache<D, E> {
    fn default() -> Self {
        Self::new()
    }
}
