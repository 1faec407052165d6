//! Class lifecycle tracker.
//!
//! # Responsibility
//! - Keep the set of prepared classes and arrays believed to be loaded.
//! - Report which of them were unloaded since the previous check.
//!
//! Each tracked class carries a host tag instead of a weak reference. A class
//! is unloaded once no live object carries its tag any more.
//!
//! # Invariants
//! - `tracked` holds exactly the recorded classes not yet reported unloaded.
//! - Tags strictly increase, are never zero and are never reassigned.
//! - Callers serialize every call; the tracker does no locking of its own.

use crate::config::AgentConfig;
use crate::error::{FatalError, TrackResult};
use crate::host::ClassHost;
use log::{debug, info};
use std::fmt::{Display, Formatter};
use std::num::NonZeroU64;

/// Tag assigned to one tracked class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassTag(NonZeroU64);

impl ClassTag {
    pub fn new(value: u64) -> Option<Self> {
        NonZeroU64::new(value).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl Display for ClassTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One class or array currently believed loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedClass {
    pub tag: ClassTag,
    pub signature: String,
}

/// Tag-based tracker of loaded classes.
pub struct ClassTracker<H: ClassHost> {
    host: Option<H>,
    tag_counter: u64,
    tracked: Vec<TrackedClass>,
    strict_mode: bool,
}

impl<H: ClassHost> ClassTracker<H> {
    pub fn new(strict_mode: bool) -> Self {
        Self {
            host: None,
            tag_counter: 0,
            tracked: Vec::new(),
            strict_mode,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.strict_mode)
    }

    /// Binds `host` and records every prepared class or array already loaded.
    ///
    /// Classes are recorded in enumeration order, so the first one gets tag 1.
    ///
    /// # Errors
    /// - Failing to enumerate loaded classes is fatal.
    /// - Any failure while recording one class is fatal.
    pub fn initialize(&mut self, host: H) -> TrackResult<()> {
        self.host = Some(host);
        self.tag_counter = 0;
        self.tracked.clear();

        let classes = self
            .host_ref()?
            .loaded_classes()
            .map_err(|err| FatalError::host(err, "loaded classes array"))?;
        let total = classes.len();
        for (class, status) in classes {
            if status.is_trackable() {
                self.record_new_class(&class)?;
            }
        }

        info!(
            "event=tracker_init module=tracker status=ok loaded={} tracked={} strict={}",
            total,
            self.tracked.len(),
            self.strict_mode
        );
        Ok(())
    }

    /// Records one newly prepared class and returns the tag it was given.
    ///
    /// # Errors
    /// - In strict mode, a class that already carries a tag fails the
    ///   duplicate assertion.
    /// - Signature lookup, tagging and allocation failures are fatal.
    pub fn record_new_class(&mut self, class: &H::Class) -> TrackResult<ClassTag> {
        let strict_mode = self.strict_mode;
        let host = self.host_mut()?;

        if strict_mode {
            let existing = host
                .get_tag(class)
                .map_err(|err| FatalError::host(err, "unable to get-tag with class tracking"))?;
            if existing != 0 {
                return Err(FatalError::assertion(format!(
                    "attempting to insert duplicate class (existing tag {existing})"
                )));
            }
        }

        let signature = host
            .signature_of(class)
            .map_err(|err| FatalError::host(err, "signature"))?;

        let next = self
            .tag_counter
            .checked_add(1)
            .and_then(ClassTag::new)
            .ok_or_else(|| FatalError::internal("class tag space exhausted"))?;
        // Consumed even when tagging fails below; tags are never handed out twice.
        self.tag_counter = next.get();

        let host = self.host_mut()?;
        host.set_tag(class, next.get())
            .map_err(|err| FatalError::host(err, "SetTag"))?;

        self.tracked
            .try_reserve(1)
            .map_err(|_| FatalError::out_of_memory("tracked class"))?;
        debug!(
            "event=class_recorded module=tracker status=ok tag={} signature={}",
            next, signature
        );
        self.tracked.push(TrackedClass {
            tag: next,
            signature,
        });
        Ok(next)
    }

    /// Removes every class whose tag no longer marks a live object and
    /// returns their signatures.
    ///
    /// All liveness queries finish before `tracked` changes, so on error the
    /// tracked set is left as it was.
    ///
    /// # Errors
    /// - A host failure while counting tagged objects is fatal.
    /// - A count other than 0 or 1 means tag uniqueness was violated; fatal.
    pub fn compute_unloaded(&mut self) -> TrackResult<Vec<String>> {
        let host = self.host_ref()?;
        let mut alive = Vec::new();
        alive
            .try_reserve_exact(self.tracked.len())
            .map_err(|_| FatalError::out_of_memory("liveness scan"))?;
        for entry in &self.tracked {
            alive.push(is_alive(host, entry.tag)?);
        }

        let dead = alive.iter().filter(|live| !**live).count();
        let mut unloaded = Vec::new();
        unloaded
            .try_reserve_exact(dead)
            .map_err(|_| FatalError::out_of_memory("signatures"))?;
        let mut kept = Vec::new();
        kept.try_reserve_exact(self.tracked.len() - dead)
            .map_err(|_| FatalError::out_of_memory("tracked classes"))?;

        for (entry, live) in std::mem::take(&mut self.tracked).into_iter().zip(alive) {
            if live {
                kept.push(entry);
            } else {
                unloaded.push(entry.signature);
            }
        }
        self.tracked = kept;

        debug!(
            "event=unload_scan module=tracker status=ok unloaded={} remaining={}",
            unloaded.len(),
            self.tracked.len()
        );
        Ok(unloaded)
    }

    /// Tears the tracker down: drops every entry and releases the host binding.
    ///
    /// The tracker must be initialized again before further use.
    pub fn reset(&mut self) {
        let dropped = self.tracked.len();
        self.tracked = Vec::new();
        self.tag_counter = 0;
        self.host = None;
        info!(
            "event=tracker_reset module=tracker status=ok dropped={}",
            dropped
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.host.is_some()
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Last tag handed out, if any.
    pub fn last_tag(&self) -> Option<ClassTag> {
        ClassTag::new(self.tag_counter)
    }

    pub fn tracked(&self) -> &[TrackedClass] {
        &self.tracked
    }

    pub fn host(&self) -> Option<&H> {
        self.host.as_ref()
    }

    fn host_ref(&self) -> TrackResult<&H> {
        self.host
            .as_ref()
            .ok_or_else(|| FatalError::internal("class tracker used before initialize"))
    }

    fn host_mut(&mut self) -> TrackResult<&mut H> {
        self.host
            .as_mut()
            .ok_or_else(|| FatalError::internal("class tracker used before initialize"))
    }
}

fn is_alive<H: ClassHost>(host: &H, tag: ClassTag) -> TrackResult<bool> {
    let count = host
        .objects_with_tag(tag.get())
        .map_err(|err| FatalError::host(err, "failed GetObjectsWithTags for class tracking"))?;
    match count {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(FatalError::internal(format!(
            "unexpected extra tags in tracking host: tag {tag} has {other} objects"
        ))),
    }
}
