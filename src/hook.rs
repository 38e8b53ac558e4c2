// Nexus Core: reactive value-synchronization library
//
// SPDX-License-Identifier: Apache-2.0
//
// Copyright (C) 2025-2026 the nexus-core contributors.
// All rights under the above copyright are reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.

//! The hook: the handle users actually hold, link, and write through (§4.2).

use alloc::string::String;
use alloc::sync::Arc;
use core::marker::PhantomData;

use crate::error::{IsolateError, LinkError, SubmitError};
use crate::id::{HookId, NexusId};
use crate::listener::Listener;
use crate::manager::{LinkMode, NexusManager};
use crate::owner::{HookKey, Owner};
use crate::value::Value;

/// An isolated validator: given a candidate value, approves or rejects it with a message.
///
/// Runs before any cross-nexus validation (§4.2); bound to a single hook, unlike
/// [`Owner::validate`], which sees the owner's whole hook set.
pub type Validator<V> = Arc<dyn Fn(&V) -> Result<(), String> + Send + Sync>;

/// A per-hook reaction: invoked after commit when this hook's nexus changes.
pub type Reaction = Arc<dyn Fn() + Send + Sync>;

/// Named handle with a stable identity, currently pointing at exactly one nexus (§4.2).
///
/// `Hook<V>` is a thin, `Clone`-able reference into a [`NexusManager`]'s internal state; cloning a
/// hook gives you a second handle to the *same* identity, not a new one (mirroring how cloning an
/// `Arc` shares the pointee). All the real state lives behind the manager's lock.
pub struct Hook<V: Value + Clone> {
    pub(crate) id: HookId,
    pub(crate) manager: NexusManager,
    pub(crate) _value: PhantomData<fn() -> V>,
}

impl<V: Value + Clone> Clone for Hook<V> {
    fn clone(&self) -> Self { Self { id: self.id, manager: self.manager.clone(), _value: PhantomData } }
}

impl<V: Value + Clone> Hook<V> {
    pub(crate) fn new(id: HookId, manager: NexusManager) -> Self { Self { id, manager, _value: PhantomData } }

    /// This hook's stable identity, independent of which nexus it currently points at.
    pub fn id(&self) -> HookId { self.id }

    /// The manager this hook belongs to. Operations mixing hooks from two different managers
    /// are a programming error; see the `# Panics` notes on [`Hook::link`] and friends.
    pub fn manager(&self) -> &NexusManager { &self.manager }

    /// The identity of the nexus this hook currently points at. Two hooks share a nexus iff their
    /// `nexus_id()` are equal (§8).
    ///
    /// # Panics
    ///
    /// Panics if the hook has been released from its manager. A hook obtained from a live
    /// `NexusManager` and never explicitly released cannot observe this.
    pub fn nexus_id(&self) -> NexusId { self.manager.hook_nexus_id(self.id).expect("hook released") }

    /// The current value of this hook's nexus.
    ///
    /// Implemented as a clone of the stored value rather than a borrow across the manager's lock:
    /// the core's concurrency model (§5) permits either strategy, and a clone keeps the public API
    /// free of lifetimes tied to an internal guard. See `DESIGN.md` for the full rationale.
    pub fn read(&self) -> V { self.manager.read_hook(self.id) }

    /// An independent clone of the current value. Identical to [`Hook::read`] in this
    /// implementation; kept as a distinct method because §4.1/§4.2 distinguish the two calls by
    /// intent (cheap read vs. guaranteed-independent copy) even though they coincide here.
    pub fn snapshot(&self) -> V { self.read() }

    /// The value displaced by the most recent commit to this hook's nexus, if any.
    pub fn previous(&self) -> Option<V> { self.manager.previous_hook(self.id) }

    /// Single-hook write: equivalent to `submit_many({self: new_value})` (§4.2, §6).
    pub fn submit(&self, new_value: V) -> Result<(), SubmitError> {
        self.manager.submit_one(self.id, Box::new(new_value))
    }

    /// Fuses this hook's nexus with `other`'s nexus (§4.3).
    ///
    /// A no-op returning `Ok(())` if the two hooks already share a nexus (§4.2 "Edge policies").
    ///
    /// # Panics
    ///
    /// Panics if `self` and `other` belong to different [`NexusManager`]s; fusing across managers
    /// is undefined and not supported (§9, "Implementations should allow multiple independent
    /// managers to coexist without cross-talk").
    pub fn link(&self, other: &Hook<V>, mode: LinkMode) -> Result<(), LinkError> {
        assert!(self.manager.same_manager(&other.manager), "Hook::link across two different NexusManagers");
        self.manager.fuse_pair(self.id, other.id, mode)
    }

    /// Atomically fuses this hook with every hook in `others`: all the fusions succeed, or none do
    /// (§4.2).
    ///
    /// # Panics
    ///
    /// Panics if any of `others` belongs to a different [`NexusManager`] than `self`.
    pub fn link_many<'a>(
        &self,
        others: impl IntoIterator<Item = &'a Hook<V>>,
        mode: LinkMode,
    ) -> Result<(), LinkError>
    where V: 'a {
        let ids: alloc::vec::Vec<HookId> = others
            .into_iter()
            .map(|h| {
                assert!(self.manager.same_manager(&h.manager), "Hook::link_many across two different NexusManagers");
                h.id
            })
            .collect();
        self.manager.fuse_many(self.id, &ids, mode)
    }

    /// Detaches this hook into a fresh nexus carrying an independent clone of its current value;
    /// the remaining members of the old nexus stay fused (§4.3).
    pub fn isolate(&self) -> Result<(), IsolateError> { self.manager.isolate(self.id) }

    /// `true` iff `self` and `other` currently share a nexus.
    pub fn is_linked_to<W: Value + Clone>(&self, other: &Hook<W>) -> bool {
        self.manager.same_manager(&other.manager) && self.nexus_id() == other.nexus_id()
    }

    /// Registers a synchronous listener, invoked (with no arguments) on every commit that affects
    /// this hook's nexus. Re-adding the same `Arc` is a no-op (§4.6).
    pub fn add_listener(&self, listener: Listener) { self.manager.add_hook_listener(self.id, listener); }

    /// Removes a previously-registered listener by `Arc` identity.
    pub fn remove_listener(&self, listener: &Listener) { self.manager.remove_hook_listener(self.id, listener); }

    /// Removes every listener registered on this hook.
    pub fn clear_listeners(&self) { self.manager.clear_hook_listeners(self.id); }

    /// Binds a [`crate::Publisher`] to this hook; it will be enqueued a
    /// [`crate::PublicationEvent::Hook`] whenever this hook's nexus commits (§4.4 phase 6.3).
    pub fn add_publisher(&self, publisher: Arc<dyn crate::publisher::Publisher>) {
        self.manager.add_hook_publisher(self.id, publisher);
    }

    /// Declares this hook as belonging to `owner` under `key`, after the fact.
    ///
    /// [`HookBuilder::owner`] covers the common case, but an owner that holds its own hooks as
    /// fields (a `Selection` owning a `selected`/`available` pair, say) can't pass `Arc<dyn Owner>`
    /// to the builder before it exists. This lets such an owner build its hooks plain, construct
    /// itself around them, and then attach itself as their owner — the same weak back-reference
    /// [`HookBuilder::owner`] installs, just in two steps instead of one.
    pub fn attach_owner(&self, owner: Arc<dyn Owner>, key: impl Into<HookKey>) {
        self.manager.attach_owner(self.id, owner, key.into());
    }
}

/// Fluent constructor for a [`Hook`]: one struct, optional pieces added by chained calls,
/// consumed by a final call that does the work.
///
/// Covers arbitrary combinations of `{plain, with_validator, with_reaction, with_owner}` without
/// a class hierarchy: every combination is just which builder methods were called before
/// [`HookBuilder::build`].
pub struct HookBuilder<V: Value + Clone> {
    manager: NexusManager,
    value: V,
    validator: Option<Validator<V>>,
    reaction: Option<Reaction>,
    owner: Option<(Arc<dyn Owner>, HookKey)>,
}

impl<V: Value + Clone> HookBuilder<V> {
    pub(crate) fn new(manager: NexusManager, value: V) -> Self {
        Self { manager, value, validator: None, reaction: None, owner: None }
    }

    /// Installs an isolated validator run against every candidate for this hook's nexus before
    /// any owner-level validation (§4.2, §4.4 phase 4.1).
    pub fn validator(mut self, validator: impl Fn(&V) -> Result<(), String> + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Installs a reaction invoked after commit whenever this hook's nexus changes.
    pub fn reaction(mut self, reaction: impl Fn() + Send + Sync + 'static) -> Self {
        self.reaction = Some(Arc::new(reaction));
        self
    }

    /// Declares this hook as belonging to `owner` under `key`, the name used in owner-keyed
    /// completion/validation snapshots and in `submit_many` maps built from an owner's `hooks()`.
    pub fn owner(mut self, owner: Arc<dyn Owner>, key: impl Into<HookKey>) -> Self {
        self.owner = Some((owner, key.into()));
        self
    }

    /// Finalizes construction, registering a fresh nexus (singleton membership) for the new hook.
    pub fn build(self) -> Hook<V> {
        self.manager
            .register_hook(self.value, self.validator, self.reaction, self.owner)
    }
}

#[cfg(test)]
mod tests {
    use crate::manager::NexusManager;

    #[test]
    fn id_is_stable_across_clones_and_independent_of_nexus() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let clone = a.clone();
        assert_eq!(a.id(), clone.id());

        let b = mgr.new_hook(2i32);
        a.link(&b, crate::manager::LinkMode::UseSelf).unwrap();
        // linking changes which nexus `a` points at, never its own identity.
        assert_eq!(a.id(), clone.id());
    }

    #[test]
    fn two_fresh_hooks_are_not_linked() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let b = mgr.new_hook(1i32);
        assert!(!a.is_linked_to(&b));
    }

    #[test]
    fn read_reflects_last_commit_and_previous_reflects_the_prior_value() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        assert_eq!(a.read(), 1);
        assert!(a.previous().is_none());
        a.submit(2).unwrap();
        assert_eq!(a.read(), 2);
        assert_eq!(a.previous(), Some(1));
    }

    #[test]
    fn builder_combines_validator_and_reaction() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let mgr = NexusManager::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        let hook = mgr
            .hook(1i32)
            .validator(|v: &i32| if *v >= 0 { Ok(()) } else { Err("negative".into()) })
            .reaction(move || fired2.store(true, Ordering::SeqCst))
            .build();

        assert!(hook.submit(-1).is_err());
        assert!(!fired.load(Ordering::SeqCst));
        assert!(hook.submit(5).is_ok());
        assert!(fired.load(Ordering::SeqCst));
    }
}
