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

//! The owner contract (§4.5): the interface higher-level "observable" types implement to plug
//! into the core without the core knowing anything about lists, selections, or computed values.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use std::collections::{BTreeMap, BTreeSet};

use crate::id::HookId;
use crate::value::Value;

/// The name under which an [`Owner`] exposes one of its hooks.
///
/// Used to key `submit_many`-style maps and the snapshots passed to [`Owner::complete`] and
/// [`Owner::validate`].
pub type HookKey = String;

/// A logical grouping of one or more hooks declared by higher-level code (§3, §4.5).
///
/// The core only ever calls these four operations (plus the listener and publisher lists the
/// manager keeps on an owner's behalf via [`crate::NexusManager::owner_side_channel`]); an owner
/// is free to carry whatever other API its own callers need — `Owner` is a narrow seam, not a
/// base class.
///
/// Hooks reference their owner weakly (`Weak<dyn Owner>`): destroying the owner does not destroy
/// the hook, and the manager treats an absent owner as contributing no completion, no validator,
/// and no reaction (§9 "Cycles and ownership").
pub trait Owner: Send + Sync {
    /// An identity-stable, ordered mapping from key to the hook that key names.
    fn hooks(&self) -> BTreeMap<HookKey, HookId>;

    /// Given the subset of this owner's hooks being written in the current submission, may
    /// return additional `(key, value)` pairs for its *other* hooks.
    ///
    /// Called at most once per owner per submission (§4.4 phase 2, §9): owners that need
    /// iterative convergence must fold that logic inside their own implementation. The default
    /// implementation is the trivial owner's: it contributes nothing.
    fn complete(
        &self,
        submitted: &BTreeMap<HookKey, Box<dyn Value>>,
    ) -> Result<BTreeMap<HookKey, Box<dyn Value>>, String> {
        let _ = submitted;
        Ok(BTreeMap::new())
    }

    /// Cross-hook invariant check against a full key→value snapshot of this owner's hooks, where
    /// affected keys hold their candidate value and unaffected keys hold their current value.
    fn validate(&self, full_snapshot: &BTreeMap<HookKey, Box<dyn Value>>) -> Result<(), String> {
        let _ = full_snapshot;
        Ok(())
    }

    /// Called at most once per submission, iff at least one of this owner's hooks was affected.
    ///
    /// Runs under the manager's write lock: it must be fast and must not submit back into the
    /// manager (doing so from a listener is rejected as [`crate::SubmitError::NestedSubmission`];
    /// this method is not a listener, but the same rule applies in spirit — see §4.4 phase 6.1).
    fn react_to_change(&self, affected_keys: &BTreeSet<HookKey>) { let _ = affected_keys; }

    /// A human-readable label used only in error messages and log lines; defaults to the
    /// concrete owner type's name.
    fn label(&self) -> String { core::any::type_name::<Self>().into() }
}

/// Identity wrapper around `Arc<dyn Owner>` used as a hash-map/`Vec` key.
///
/// Equality and hashing are both pointer-based (`Arc::as_ptr`), never by `label()` or by
/// `hooks()` contents. Comparing raw pointers is normally an ABA hazard (a dropped allocation's
/// address can be reused by an unrelated later allocation), but `OwnerHandle` holds a *strong*
/// `Arc`, not a borrowed pointer: as long as an `OwnerHandle` exists — whether for the span of one
/// submission (built fresh from a live `Weak::upgrade`) or indefinitely in the manager's owner
/// listener/publisher tables — its `Arc` keeps the pointee alive, so the address it wraps cannot
/// be reused while the handle itself is reachable. Registering a listener or publisher against an
/// owner therefore keeps that owner alive for as long as the registration exists; clearing the
/// registration (or dropping the manager) releases it.
#[derive(Clone)]
pub(crate) struct OwnerHandle(pub Arc<dyn Owner>);

impl PartialEq for OwnerHandle {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(Arc::as_ptr(&self.0) as *const (), Arc::as_ptr(&other.0) as *const ())
    }
}

impl Eq for OwnerHandle {}

impl core::hash::Hash for OwnerHandle {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const ()).hash(state)
    }
}
