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

//! Append-only, dedup-by-identity listener lists (§4.6).
//!
//! Listeners observe that something changed; they do not see values. A caller registers a
//! listener as an `Arc` it keeps hold of, so the same `Arc` can later be passed to
//! `remove_listener` — identity is `Arc` pointer equality, not closure contents.

use alloc::sync::Arc;
use alloc::vec::Vec;

/// A synchronous, side-effect-only callback invoked on commit.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Registration-ordered, identity-deduplicated list of [`Listener`]s.
///
/// Mutating the list mid-notification (from inside a listener callback) has no effect on the
/// notification pass already in flight, because [`ListenerRegistry::snapshot`] is what phase 6
/// iterates over, not the live list (§4.6, "Adding or removing a listener mid-notification has no
/// effect on the current notification pass").
#[derive(Default, Clone)]
pub(crate) struct ListenerRegistry(Vec<Listener>);

impl ListenerRegistry {
    pub(crate) fn new() -> Self { Self(Vec::new()) }

    /// Appends `listener` unless an identical `Arc` is already registered.
    pub(crate) fn add(&mut self, listener: Listener) {
        if !self.0.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            self.0.push(listener);
        }
    }

    /// Removes every registration that points at the same `Arc` as `listener`.
    pub(crate) fn remove(&mut self, listener: &Listener) { self.0.retain(|l| !Arc::ptr_eq(l, listener)); }

    pub(crate) fn clear(&mut self) { self.0.clear(); }

    /// A point-in-time copy to iterate over during notification, immune to listeners that
    /// add/remove other listeners while they run.
    pub(crate) fn snapshot(&self) -> Vec<Listener> { self.0.clone() }
}
