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

//! The manager: the global write lock and the six-phase submission pipeline (§4.4).
//!
//! # Borrow-scoping discipline
//!
//! The manager's state lives behind `ReentrantMutex<RefCell<State>>`. The mutex is reentrant so
//! that a callback invoked from inside the pipeline (an owner's `complete`/`validate`, a hook's
//! reaction, a listener) can legally call back in to read a nexus via `Hook::read` without
//! deadlocking. The `RefCell`, however, is *not* reentrant the way the mutex is: a `borrow_mut()`
//! held across a callback would panic the moment that callback tried its own `borrow()`. Every
//! method below therefore takes the `RefCell` borrow only for the span of a pure bookkeeping step,
//! drops it, and only then invokes user code — callbacks never run while a borrow is live.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::ReentrantMutex;

use crate::error::{IsolateError, LinkError, SubmitError};
use crate::hook::{Hook, HookBuilder, Reaction, Validator};
use crate::id::{HookId, NexusId};
use crate::listener::{Listener, ListenerRegistry};
use crate::nexus::Nexus;
use crate::owner::{HookKey, Owner, OwnerHandle};
use crate::publisher::{PublicationEvent, PublisherHandle};
use crate::value::{boxed_eq, Value};

type BoxedValidator = Arc<dyn Fn(&dyn Value) -> Result<(), String> + Send + Sync>;

/// Which of the two pre-fusion current values becomes the fused shared value (§4.3, §6).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LinkMode {
    /// The candidate is the nexus-holding hook's own current value (the hook `link` was called
    /// on, or `self` in `Hook::link_many`).
    UseSelf,
    /// The candidate is the other hook's current value (for `link_many`, the first of `others`).
    UseOther,
}

/// Flags accepted by a submission (§4.4).
#[derive(Copy, Clone, Debug)]
pub struct SubmitFlags {
    /// Bypasses the phase 1 equality short-circuit.
    pub force: bool,
    /// Whether phase 2 owner completion runs at all.
    pub owner_completion_enabled: bool,
}

/// In-process configuration for a [`NexusManager`].
///
/// The core has no persistence and no network transport, so there is nothing here to load from a
/// file or environment; this only tunes in-process behavior.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Default for [`SubmitFlags::owner_completion_enabled`] when a caller doesn't override it.
    pub default_owner_completion_enabled: bool,
    /// Initial `HashMap`/`IndexMap` capacity hint for the nexus and hook tables. Pure performance
    /// hint, no observable semantics.
    pub capacity_hint: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self { Self { default_owner_completion_enabled: true, capacity_hint: 0 } }
}

struct HookEntry {
    nexus: NexusId,
    validator: Option<BoxedValidator>,
    reaction: Option<Reaction>,
    owner: Option<(Weak<dyn Owner>, HookKey)>,
    listeners: ListenerRegistry,
    publishers: Vec<PublisherHandle>,
}

struct State {
    nexuses: IndexMap<NexusId, Nexus>,
    hooks: IndexMap<HookId, HookEntry>,
    owner_listeners: Vec<(OwnerHandle, ListenerRegistry)>,
    owner_publishers: Vec<(OwnerHandle, Vec<PublisherHandle>)>,
    in_notification: bool,
    config: ManagerConfig,
}

/// Process-wide (or explicitly scoped) coordinator holding the global write lock and running the
/// submission pipeline (§2, §4.4).
///
/// Cheap to clone: a `NexusManager` is a handle (`Arc`-backed) to shared state, like [`Hook`].
/// Nothing stops an application from constructing several independent managers; they never
/// cross-talk (§9, "Global state").
#[derive(Clone)]
pub struct NexusManager {
    inner: Arc<ReentrantMutex<RefCell<State>>>,
}

impl Default for NexusManager {
    fn default() -> Self { Self::new() }
}

impl NexusManager {
    pub fn new() -> Self { Self::with_config(ManagerConfig::default()) }

    pub fn with_config(config: ManagerConfig) -> Self {
        let state = State {
            nexuses: IndexMap::with_capacity(config.capacity_hint),
            hooks: IndexMap::with_capacity(config.capacity_hint),
            owner_listeners: Vec::new(),
            owner_publishers: Vec::new(),
            in_notification: false,
            config,
        };
        Self { inner: Arc::new(ReentrantMutex::new(RefCell::new(state))) }
    }

    pub(crate) fn same_manager(&self, other: &Self) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }

    fn default_owner_completion(&self) -> bool {
        let guard = self.inner.lock();
        guard.borrow().config.default_owner_completion_enabled
    }

    // ---- construction -----------------------------------------------------------------------

    pub fn new_hook<V: Value + Clone>(&self, value: V) -> Hook<V> { self.hook(value).build() }

    pub fn new_hook_with_owner<V: Value + Clone>(
        &self,
        owner: Arc<dyn Owner>,
        key: impl Into<HookKey>,
        value: V,
    ) -> Hook<V> {
        self.hook(value).owner(owner, key).build()
    }

    pub fn new_hook_with_validator<V: Value + Clone>(
        &self,
        value: V,
        validator: impl Fn(&V) -> Result<(), String> + Send + Sync + 'static,
    ) -> Hook<V> {
        self.hook(value).validator(validator).build()
    }

    pub fn new_hook_with_reaction<V: Value + Clone>(
        &self,
        value: V,
        reaction: impl Fn() + Send + Sync + 'static,
    ) -> Hook<V> {
        self.hook(value).reaction(reaction).build()
    }

    /// Fluent constructor for combinations of validator/reaction/owner (§9 "Polymorphism").
    pub fn hook<V: Value + Clone>(&self, value: V) -> HookBuilder<V> { HookBuilder::new(self.clone(), value) }

    pub(crate) fn register_hook<V: Value + Clone>(
        &self,
        value: V,
        validator: Option<Validator<V>>,
        reaction: Option<Reaction>,
        owner: Option<(Arc<dyn Owner>, HookKey)>,
    ) -> Hook<V> {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();

        let hook_id = HookId::new();
        let nexus_id = NexusId::new();

        let validator = validator.map(|typed: Validator<V>| -> BoxedValidator {
            Arc::new(move |value: &dyn Value| {
                let typed_value = value
                    .as_any()
                    .downcast_ref::<V>()
                    .expect("nexus value type mismatch: a hook's validator saw a foreign type");
                typed(typed_value)
            })
        });
        let owner = owner.map(|(owner, key)| (Arc::downgrade(&owner), key));

        state.nexuses.insert(nexus_id, Nexus::new(Box::new(value), hook_id));
        state.hooks.insert(hook_id, HookEntry {
            nexus: nexus_id,
            validator,
            reaction,
            owner,
            listeners: ListenerRegistry::new(),
            publishers: Vec::new(),
        });

        drop(state);
        drop(guard);
        Hook::new(hook_id, self.clone())
    }

    /// Backs [`Hook::attach_owner`]: installs a weak back-reference to `owner` on an already-built
    /// hook, for owners that hold their own hooks as fields and so can't exist yet when the hook
    /// is constructed.
    pub(crate) fn attach_owner(&self, id: HookId, owner: Arc<dyn Owner>, key: HookKey) {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        if let Some(entry) = state.hooks.get_mut(&id) {
            entry.owner = Some((Arc::downgrade(&owner), key));
        }
    }

    fn live_owner(state: &State, hook_id: HookId) -> Option<OwnerHandle> {
        let entry = state.hooks.get(&hook_id)?;
        let (weak, _key) = entry.owner.as_ref()?;
        match weak.upgrade() {
            Some(owner) => Some(OwnerHandle(owner)),
            None => {
                log::warn!("hook {hook_id} references an owner that has been dropped");
                None
            }
        }
    }

    // ---- reads --------------------------------------------------------------------------------

    pub(crate) fn hook_nexus_id(&self, id: HookId) -> Option<NexusId> {
        let guard = self.inner.lock();
        let state = guard.borrow();
        state.hooks.get(&id).map(|entry| entry.nexus)
    }

    pub(crate) fn read_hook<V: Value + Clone>(&self, id: HookId) -> V {
        let guard = self.inner.lock();
        let state = guard.borrow();
        let entry = state.hooks.get(&id).expect("hook released");
        let nexus = state.nexuses.get(&entry.nexus).expect("dangling nexus reference");
        nexus.current().downcast::<V>()
    }

    pub(crate) fn previous_hook<V: Value + Clone>(&self, id: HookId) -> Option<V> {
        let guard = self.inner.lock();
        let state = guard.borrow();
        let entry = state.hooks.get(&id).expect("hook released");
        let nexus = state.nexuses.get(&entry.nexus).expect("dangling nexus reference");
        nexus.previous().map(|v| v.downcast::<V>())
    }

    // ---- listeners / publishers -----------------------------------------------------------------

    pub(crate) fn add_hook_listener(&self, id: HookId, listener: Listener) {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        if let Some(entry) = state.hooks.get_mut(&id) {
            entry.listeners.add(listener);
        }
    }

    pub(crate) fn remove_hook_listener(&self, id: HookId, listener: &Listener) {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        if let Some(entry) = state.hooks.get_mut(&id) {
            entry.listeners.remove(listener);
        }
    }

    pub(crate) fn clear_hook_listeners(&self, id: HookId) {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        if let Some(entry) = state.hooks.get_mut(&id) {
            entry.listeners.clear();
        }
    }

    pub(crate) fn add_hook_publisher(&self, id: HookId, publisher: PublisherHandle) {
        let guard = self.inner.lock();
        let mut state = guard.borrow_mut();
        if let Some(entry) = state.hooks.get_mut(&id) {
            entry.publishers.push(publisher);
        }
    }

    /// A handle for managing the listeners and publishers registered directly on `owner` (as
    /// opposed to on one of its hooks), per §6 "Listener management ... on hooks and on owners".
    pub fn owner_side_channel(&self, owner: &Arc<dyn Owner>) -> OwnerSideChannel<'_> {
        OwnerSideChannel { manager: self, owner: OwnerHandle(owner.clone()) }
    }

    // ---- submission -----------------------------------------------------------------------------

    /// Starts a fluent, possibly-multi-hook submission: accumulate `(hook, value)` pairs, then
    /// `commit()` them atomically.
    pub fn submission(&self) -> Submission<'_> {
        Submission {
            manager: self,
            entries: Vec::new(),
            flags: SubmitFlags { force: false, owner_completion_enabled: self.default_owner_completion() },
        }
    }

    pub(crate) fn submit_one(&self, id: HookId, value: Box<dyn Value>) -> Result<(), SubmitError> {
        let flags = SubmitFlags { force: false, owner_completion_enabled: self.default_owner_completion() };
        self.submit_many(vec![(id, value)], flags)
    }

    pub(crate) fn submit_many(
        &self,
        entries: Vec<(HookId, Box<dyn Value>)>,
        flags: SubmitFlags,
    ) -> Result<(), SubmitError> {
        let guard = self.inner.lock();

        if guard.borrow().in_notification {
            return Err(SubmitError::NestedSubmission);
        }

        // Phase 1 -- equality short-circuit.
        let mut working: IndexMap<HookId, Box<dyn Value>> = {
            let state = guard.borrow();
            let mut working = IndexMap::new();
            for (hook_id, candidate) in entries {
                let entry = state.hooks.get(&hook_id).ok_or(SubmitError::DeadHook(hook_id))?;
                let nexus = state.nexuses.get(&entry.nexus).ok_or(SubmitError::DeadNexus(entry.nexus))?;
                if !flags.force && boxed_eq(candidate.as_ref(), nexus.current()) {
                    continue;
                }
                working.insert(hook_id, candidate);
            }
            working
        };
        if working.is_empty() {
            log::trace!("submit_many: empty working set after phase 1, no-op");
            return Ok(());
        }
        log::trace!("submit_many: phase 1 complete, {} hook(s) pending", working.len());

        // Phase 2 -- owner completion. One pass per distinct owner, never revisited (§9).
        if flags.owner_completion_enabled {
            let candidate_owners: Vec<HookId> = working.keys().copied().collect();
            let mut visited: Vec<OwnerHandle> = Vec::new();
            for hook_id in candidate_owners {
                let owner = {
                    let state = guard.borrow();
                    Self::live_owner(&state, hook_id)
                };
                let Some(owner) = owner else { continue };
                if visited.iter().any(|seen| seen == &owner) {
                    continue;
                }
                visited.push(owner.clone());

                let keys = owner.0.hooks();
                let mut submitted_subset = BTreeMap::new();
                for (key, hid) in &keys {
                    if let Some(value) = working.get(hid) {
                        submitted_subset.insert(key.clone(), value.value_clone());
                    }
                }

                log::trace!("submit_many: phase 2 completing owner '{}'", owner.0.label());
                let extra = owner
                    .0
                    .complete(&submitted_subset)
                    .map_err(|message| SubmitError::CompletionFailure { owner: owner.0.label(), message })?;
                for (key, value) in extra {
                    if let Some(&hid) = keys.get(&key) {
                        working.entry(hid).or_insert(value);
                    }
                }
            }
        }

        // Phase 3 -- affected-set collection, grouped by target nexus.
        let affected: IndexMap<NexusId, Box<dyn Value>> = {
            let state = guard.borrow();
            let mut affected: IndexMap<NexusId, Box<dyn Value>> = IndexMap::new();
            for (hook_id, candidate) in working.iter() {
                let entry = state.hooks.get(hook_id).ok_or(SubmitError::DeadHook(*hook_id))?;
                match affected.get(&entry.nexus) {
                    Some(existing) if !boxed_eq(existing.as_ref(), candidate.as_ref()) => {
                        return Err(SubmitError::ValueConflict(entry.nexus));
                    }
                    Some(_) => {}
                    None => {
                        affected.insert(entry.nexus, candidate.value_clone());
                    }
                }
            }
            affected
        };

        // Every member of every affected nexus is affected, not only the hook explicitly named
        // in the submission -- they all read the same nexus.
        let (affected_hooks, owner_snapshots) = {
            let state = guard.borrow();
            let mut affected_hooks = Vec::new();
            let mut owner_handles: Vec<OwnerHandle> = Vec::new();
            for nexus_id in affected.keys() {
                let nexus = state.nexuses.get(nexus_id).expect("affected nexus must exist");
                for &hook_id in nexus.members() {
                    affected_hooks.push(hook_id);
                    if let Some(owner) = Self::live_owner(&state, hook_id) {
                        if !owner_handles.iter().any(|seen| seen == &owner) {
                            owner_handles.push(owner);
                        }
                    }
                }
            }

            let mut owner_snapshots = Vec::new();
            for owner in owner_handles {
                let keys = owner.0.hooks();
                let mut snapshot = BTreeMap::new();
                let mut changed = BTreeSet::new();
                for (key, hid) in &keys {
                    let Some(entry) = state.hooks.get(hid) else { continue };
                    let value = match affected.get(&entry.nexus) {
                        Some(candidate) => {
                            changed.insert(key.clone());
                            candidate.value_clone()
                        }
                        None => state
                            .nexuses
                            .get(&entry.nexus)
                            .expect("hook's nexus must exist")
                            .current()
                            .value_clone(),
                    };
                    snapshot.insert(key.clone(), value);
                }
                owner_snapshots.push((owner, snapshot, changed));
            }
            (affected_hooks, owner_snapshots)
        };

        // Phase 4 -- validation. No mutation of any kind happens in this block.
        {
            let validators: Vec<(HookId, Box<dyn Value>, Option<BoxedValidator>)> = {
                let state = guard.borrow();
                let mut out = Vec::new();
                for (nexus_id, candidate) in affected.iter() {
                    let nexus = state.nexuses.get(nexus_id).expect("affected nexus must exist");
                    for &hook_id in nexus.members() {
                        let entry = state.hooks.get(&hook_id).expect("member hook must exist");
                        out.push((hook_id, candidate.value_clone(), entry.validator.clone()));
                    }
                }
                out
            };
            for (hook_id, candidate, validator) in validators {
                if let Some(validator) = validator {
                    validator(candidate.as_ref())
                        .map_err(|message| SubmitError::IsolatedValidation { hook: hook_id, message })?;
                }
            }
        }
        for (owner, snapshot, _changed) in &owner_snapshots {
            owner
                .0
                .validate(snapshot)
                .map_err(|message| SubmitError::OwnerValidation { owner: owner.0.label(), message })?;
        }

        // Phase 5 -- commit.
        {
            let mut state = guard.borrow_mut();
            for (nexus_id, candidate) in affected {
                let nexus = state.nexuses.get_mut(&nexus_id).expect("affected nexus must exist");
                nexus.replace_value(candidate);
            }
        }

        // Phase 6 -- notification, in the order §4.4 fixes.
        let _notify_guard = {
            let mut state = guard.borrow_mut();
            NotifyGuard::enter(self, &mut state)
        };

        // 6.1 Invalidation: each affected owner's react_to_change, exactly once.
        for (owner, _snapshot, changed) in &owner_snapshots {
            owner.0.react_to_change(changed);
        }

        // 6.2 Reactions: every affected hook whose nexus value changed.
        let reactions: Vec<Reaction> = {
            let state = guard.borrow();
            affected_hooks
                .iter()
                .filter_map(|hook_id| state.hooks.get(hook_id).and_then(|entry| entry.reaction.clone()))
                .collect()
        };
        for reaction in reactions {
            reaction();
        }

        // 6.3 Publishers: enqueued within the lock, delivered by the publisher's own worker.
        let hook_publications: Vec<(PublisherHandle, PublicationEvent)> = {
            let state = guard.borrow();
            let mut out = Vec::new();
            for &hook_id in &affected_hooks {
                if let Some(entry) = state.hooks.get(&hook_id) {
                    for publisher in &entry.publishers {
                        out.push((publisher.clone(), PublicationEvent::Hook(hook_id)));
                    }
                }
            }
            out
        };
        for (publisher, event) in hook_publications {
            publisher.enqueue(event);
        }
        let owner_publications: Vec<(PublisherHandle, PublicationEvent)> = {
            let state = guard.borrow();
            let mut out = Vec::new();
            for (owner, _snapshot, changed) in &owner_snapshots {
                if let Some((_, publishers)) = state.owner_publishers.iter().find(|(o, _)| o == owner) {
                    for publisher in publishers {
                        out.push((publisher.clone(), PublicationEvent::Owner {
                            label: owner.0.label(),
                            keys: changed.clone(),
                        }));
                    }
                }
            }
            out
        };
        for (publisher, event) in owner_publications {
            publisher.enqueue(event);
        }

        // 6.4 Listeners: owners, then hooks.
        let owner_listener_batches: Vec<Vec<Listener>> = {
            let state = guard.borrow();
            owner_snapshots
                .iter()
                .filter_map(|(owner, ..)| {
                    state.owner_listeners.iter().find(|(o, _)| o == owner).map(|(_, reg)| reg.snapshot())
                })
                .collect()
        };
        for batch in owner_listener_batches {
            for listener in batch {
                listener();
            }
        }
        let hook_listener_batches: Vec<Vec<Listener>> = {
            let state = guard.borrow();
            affected_hooks
                .iter()
                .filter_map(|hook_id| state.hooks.get(hook_id).map(|entry| entry.listeners.snapshot()))
                .collect()
        };
        for batch in hook_listener_batches {
            for listener in batch {
                listener();
            }
        }

        Ok(())
    }

    // ---- fusion / isolation -----------------------------------------------------------------------

    pub(crate) fn fuse_pair(&self, a: HookId, b: HookId, mode: LinkMode) -> Result<(), LinkError> {
        self.fuse_many(a, &[b], mode)
    }

    pub(crate) fn fuse_many(&self, a: HookId, others: &[HookId], mode: LinkMode) -> Result<(), LinkError> {
        let guard = self.inner.lock();

        if guard.borrow().in_notification {
            return Err(LinkError::from(SubmitError::NestedSubmission));
        }

        // Step 1-3: pick keeper/doomed, compute the fusion candidate, without mutating anything.
        let (keeper, doomed, candidate) = {
            let state = guard.borrow();
            let keeper = state
                .hooks
                .get(&a)
                .ok_or_else(|| LinkError::from(SubmitError::DeadHook(a)))?
                .nexus;

            let mut doomed = Vec::new();
            for &other in others {
                let other_nexus = state
                    .hooks
                    .get(&other)
                    .ok_or_else(|| LinkError::from(SubmitError::DeadHook(other)))?
                    .nexus;
                if other_nexus != keeper && !doomed.contains(&other_nexus) {
                    doomed.push(other_nexus);
                }
            }
            if doomed.is_empty() {
                return Ok(());
            }

            let candidate = match mode {
                LinkMode::UseSelf => state.nexuses.get(&keeper).expect("keeper must exist").current().value_clone(),
                LinkMode::UseOther => state
                    .nexuses
                    .get(&doomed[0])
                    .expect("doomed nexus must exist")
                    .current()
                    .value_clone(),
            };
            (keeper, doomed, candidate)
        };

        // Step 4: virtual submission over the combined membership.
        let combined: HashSet<NexusId> = core::iter::once(keeper).chain(doomed.iter().copied()).collect();
        let (member_hooks, owner_snapshots) = {
            let state = guard.borrow();
            let mut member_hooks = Vec::new();
            for nexus_id in &combined {
                member_hooks.extend(state.nexuses.get(nexus_id).expect("combined nexus must exist").members());
            }

            let mut owner_handles: Vec<OwnerHandle> = Vec::new();
            for &hook_id in &member_hooks {
                if let Some(owner) = Self::live_owner(&state, hook_id) {
                    if !owner_handles.iter().any(|seen| seen == &owner) {
                        owner_handles.push(owner);
                    }
                }
            }

            let mut owner_snapshots = Vec::new();
            for owner in owner_handles {
                let keys = owner.0.hooks();
                let mut snapshot = BTreeMap::new();
                let mut changed = BTreeSet::new();
                for (key, hid) in &keys {
                    let Some(entry) = state.hooks.get(hid) else { continue };
                    let value = if combined.contains(&entry.nexus) {
                        changed.insert(key.clone());
                        candidate.value_clone()
                    } else {
                        state.nexuses.get(&entry.nexus).expect("hook nexus must exist").current().value_clone()
                    };
                    snapshot.insert(key.clone(), value);
                }
                owner_snapshots.push((owner, snapshot, changed));
            }
            (member_hooks, owner_snapshots)
        };

        {
            let validators: Vec<(HookId, Option<BoxedValidator>)> = {
                let state = guard.borrow();
                member_hooks.iter().map(|&h| (h, state.hooks.get(&h).and_then(|e| e.validator.clone()))).collect()
            };
            for (hook_id, validator) in validators {
                if let Some(validator) = validator {
                    validator(candidate.as_ref())
                        .map_err(|message| LinkError::from(SubmitError::IsolatedValidation { hook: hook_id, message }))?;
                }
            }
        }
        for (owner, snapshot, _changed) in &owner_snapshots {
            owner
                .0
                .validate(snapshot)
                .map_err(|message| LinkError::from(SubmitError::OwnerValidation { owner: owner.0.label(), message }))?;
        }

        // Step 5: commit -- move every doomed hook into the keeper, then notify.
        {
            let mut state = guard.borrow_mut();
            for &d in &doomed {
                let mut donor = state.nexuses.swap_remove(&d).expect("doomed nexus must exist");
                let donor_members: Vec<HookId> = donor.members().iter().copied().collect();
                state.nexuses.get_mut(&keeper).expect("keeper must exist").absorb_members(&mut donor);
                for hook_id in donor_members {
                    if let Some(entry) = state.hooks.get_mut(&hook_id) {
                        entry.nexus = keeper;
                    }
                }
            }
            let keeper_nexus = state.nexuses.get_mut(&keeper).expect("keeper must exist");
            if !boxed_eq(keeper_nexus.current(), candidate.as_ref()) {
                keeper_nexus.replace_value(candidate.value_clone());
            }
            log::debug!("link: fused {} doomed nexus(es) into keeper {keeper}", doomed.len());
        }
        let _notify_guard = {
            let mut state = guard.borrow_mut();
            NotifyGuard::enter(self, &mut state)
        };

        for (owner, _snapshot, changed) in &owner_snapshots {
            owner.0.react_to_change(changed);
        }
        let reactions: Vec<Reaction> = {
            let state = guard.borrow();
            member_hooks
                .iter()
                .filter_map(|hook_id| state.hooks.get(hook_id).and_then(|entry| entry.reaction.clone()))
                .collect()
        };
        for reaction in reactions {
            reaction();
        }
        let hook_listener_batches: Vec<Vec<Listener>> = {
            let state = guard.borrow();
            member_hooks
                .iter()
                .filter_map(|hook_id| state.hooks.get(hook_id).map(|entry| entry.listeners.snapshot()))
                .collect()
        };
        let owner_listener_batches: Vec<Vec<Listener>> = {
            let state = guard.borrow();
            owner_snapshots
                .iter()
                .filter_map(|(owner, ..)| {
                    state.owner_listeners.iter().find(|(o, _)| o == owner).map(|(_, reg)| reg.snapshot())
                })
                .collect()
        };
        for batch in owner_listener_batches.into_iter().chain(hook_listener_batches) {
            for listener in batch {
                listener();
            }
        }

        Ok(())
    }

    pub(crate) fn isolate(&self, id: HookId) -> Result<(), IsolateError> {
        let guard = self.inner.lock();

        if guard.borrow().in_notification {
            return Err(IsolateError::NestedSubmission);
        }

        let mut state = guard.borrow_mut();

        let old_nexus = state.hooks.get(&id).ok_or(IsolateError::DeadHook(id))?.nexus;
        let member_count = state.nexuses.get(&old_nexus).expect("nexus must exist").member_count();
        if member_count == 1 {
            log::debug!("isolate: hook {id} already alone in {old_nexus}, treating as a no-op");
            return Ok(());
        }

        let cloned_value = state.nexuses.get(&old_nexus).expect("nexus must exist").current().value_clone();
        let new_nexus = NexusId::new();

        state.nexuses.get_mut(&old_nexus).expect("nexus must exist").remove_member(id);
        state.nexuses.insert(new_nexus, Nexus::new(cloned_value, id));
        state.hooks.get_mut(&id).expect("hook must exist").nexus = new_nexus;

        log::debug!("isolate: hook {id} detached from {old_nexus} into fresh nexus {new_nexus}");
        Ok(())
    }
}

/// Marks phase 6 as in-flight for the duration of its lifetime, restoring `in_notification` to
/// whatever it was before entry (rather than unconditionally clearing it) when dropped.
///
/// Every mutating entry point (`submit_many`, `fuse_many`, `isolate`) rejects a nested call before
/// ever constructing one of these, so in practice `previous` is always `false` today -- this
/// guard is written to stay correct even if that invariant ever changes, rather than relying on
/// it.
struct NotifyGuard<'m> {
    manager: &'m NexusManager,
    previous: bool,
}

impl<'m> NotifyGuard<'m> {
    fn enter(manager: &'m NexusManager, state: &mut State) -> Self {
        let previous = state.in_notification;
        state.in_notification = true;
        Self { manager, previous }
    }
}

impl Drop for NotifyGuard<'_> {
    fn drop(&mut self) {
        let guard = self.manager.inner.lock();
        guard.borrow_mut().in_notification = self.previous;
    }
}

/// Fluent, atomic multi-hook submission builder.
pub struct Submission<'m> {
    manager: &'m NexusManager,
    entries: Vec<(HookId, Box<dyn Value>)>,
    flags: SubmitFlags,
}

impl<'m> Submission<'m> {
    /// Adds one `(hook, candidate)` pair to the submission.
    ///
    /// # Panics
    ///
    /// Panics if `hook` belongs to a different [`NexusManager`] than the one this submission was
    /// started from.
    pub fn with<V: Value + Clone>(mut self, hook: &Hook<V>, value: V) -> Self {
        assert!(self.manager.same_manager(hook.manager()), "Submission::with across two different NexusManagers");
        self.entries.push((hook.id(), Box::new(value)));
        self
    }

    /// Bypasses the phase 1 equality short-circuit.
    pub fn force(mut self, force: bool) -> Self {
        self.flags.force = force;
        self
    }

    /// Overrides whether phase 2 owner completion runs for this submission.
    pub fn owner_completion(mut self, enabled: bool) -> Self {
        self.flags.owner_completion_enabled = enabled;
        self
    }

    /// Runs the six-phase pipeline over the accumulated entries.
    pub fn commit(self) -> Result<(), SubmitError> { self.manager.submit_many(self.entries, self.flags) }
}

/// Listener/publisher management for an owner as a whole (as opposed to one of its hooks), since
/// [`Owner`] itself carries neither list (§4.6, §6).
pub struct OwnerSideChannel<'m> {
    manager: &'m NexusManager,
    owner: OwnerHandle,
}

impl OwnerSideChannel<'_> {
    pub fn add_listener(&self, listener: Listener) {
        let guard = self.manager.inner.lock();
        let mut state = guard.borrow_mut();
        match state.owner_listeners.iter_mut().find(|(o, _)| *o == self.owner) {
            Some((_, registry)) => registry.add(listener),
            None => {
                let mut registry = ListenerRegistry::new();
                registry.add(listener);
                state.owner_listeners.push((self.owner.clone(), registry));
            }
        }
    }

    pub fn remove_listener(&self, listener: &Listener) {
        let guard = self.manager.inner.lock();
        let mut state = guard.borrow_mut();
        if let Some((_, registry)) = state.owner_listeners.iter_mut().find(|(o, _)| *o == self.owner) {
            registry.remove(listener);
        }
    }

    pub fn clear_listeners(&self) {
        let guard = self.manager.inner.lock();
        let mut state = guard.borrow_mut();
        if let Some((_, registry)) = state.owner_listeners.iter_mut().find(|(o, _)| *o == self.owner) {
            registry.clear();
        }
    }

    pub fn add_publisher(&self, publisher: PublisherHandle) {
        let guard = self.manager.inner.lock();
        let mut state = guard.borrow_mut();
        match state.owner_publishers.iter_mut().find(|(o, _)| *o == self.owner) {
            Some((_, publishers)) => publishers.push(publisher),
            None => state.owner_publishers.push((self.owner.clone(), vec![publisher])),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn phase1_short_circuit_is_a_true_no_op() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        a.add_listener(Arc::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));
        a.submit(1).unwrap(); // same value, not forced
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        a.submit(2).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn forced_submission_bypasses_the_short_circuit() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        a.add_listener(Arc::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));
        mgr.submission().with(&a, 1).force(true).commit().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn submit_many_rejects_conflicting_candidates_on_one_nexus() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let b = mgr.new_hook(1i32);
        a.link(&b, LinkMode::UseSelf).unwrap();
        let err = mgr.submission().with(&a, 2).with(&b, 3).commit().unwrap_err();
        assert!(matches!(err, SubmitError::ValueConflict(_)));
        assert_eq!(a.read(), 1);
        assert_eq!(b.read(), 1);
    }

    #[test]
    fn nested_submission_from_a_listener_is_rejected() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let inner = a.clone();
        a.add_listener(Arc::new(move || {
            let result = inner.submit(99);
            assert!(matches!(result, Err(SubmitError::NestedSubmission)));
        }));
        a.submit(2).unwrap();
        assert_eq!(a.read(), 2);
    }

    #[test]
    fn fusion_keeper_is_the_nexus_link_was_called_on() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let b = mgr.new_hook(2i32);
        let keeper_before = a.nexus_id();
        a.link(&b, LinkMode::UseSelf).unwrap();
        assert_eq!(a.nexus_id(), keeper_before);
        assert_eq!(b.nexus_id(), keeper_before);
        assert_eq!(a.read(), 1);
        assert_eq!(b.read(), 1);
    }

    #[test]
    fn link_use_other_takes_the_target_value() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let b = mgr.new_hook(2i32);
        a.link(&b, LinkMode::UseOther).unwrap();
        assert_eq!(a.read(), 2);
        assert_eq!(b.read(), 2);
    }

    #[test]
    fn linking_already_fused_hooks_is_a_no_op() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let b = mgr.new_hook(2i32);
        a.link(&b, LinkMode::UseSelf).unwrap();
        a.link(&b, LinkMode::UseSelf).unwrap();
        a.link(&a.clone(), LinkMode::UseSelf).unwrap();
        assert_eq!(a.read(), 1);
    }

    #[test]
    fn isolating_a_singleton_nexus_is_a_silent_no_op() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let id_before = a.nexus_id();
        a.isolate().unwrap();
        assert_eq!(a.nexus_id(), id_before);
    }

    #[test]
    fn nested_link_from_a_listener_is_rejected() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let b = mgr.new_hook(2i32);
        let c = mgr.new_hook(3i32);
        let inner_b = b.clone();
        let inner_c = c.clone();
        a.add_listener(Arc::new(move || {
            let result = inner_b.link(&inner_c, LinkMode::UseSelf);
            assert!(matches!(result, Err(LinkError::FusionRejected(SubmitError::NestedSubmission))));
        }));
        a.submit(2).unwrap();
        assert!(!b.is_linked_to(&c));
    }

    #[test]
    fn nested_isolate_from_a_listener_is_rejected() {
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let b = mgr.new_hook(2i32);
        let c = mgr.new_hook(2i32);
        b.link(&c, LinkMode::UseSelf).unwrap();
        let inner_b = b.clone();
        a.add_listener(Arc::new(move || {
            let result = inner_b.isolate();
            assert!(matches!(result, Err(IsolateError::NestedSubmission)));
        }));
        a.submit(2).unwrap();
        assert!(b.is_linked_to(&c));
    }

    #[test]
    fn in_notification_flag_is_cleared_after_a_rejected_nested_attempt() {
        // A listener that tries (and is rejected) to submit back must not leave `in_notification`
        // stuck at `true`: a later, unrelated submission has to see it cleared.
        let mgr = NexusManager::new();
        let a = mgr.new_hook(1i32);
        let inner = a.clone();
        a.add_listener(Arc::new(move || {
            let _ = inner.submit(99);
        }));
        a.submit(2).unwrap();
        a.submit(3).unwrap();
        assert_eq!(a.read(), 3);
    }
}
