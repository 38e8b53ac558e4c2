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

//! Stable identities for nexuses and hooks.
//!
//! Identities are process-local monotonic counters, not content hashes: a nexus has no canonical
//! encoding to hash, and a hook is a handle, not a value.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Generates process-wide unique identifiers for [`NexusId`] and [`HookId`].
///
/// A single counter is shared by both kinds so that a stale `NexusId` can never alias a live
/// `HookId` even if one of the two wraps (practically unreachable at `u64` width).
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 { NEXT_ID.fetch_add(1, Ordering::Relaxed) }

/// Opaque identity of a [`crate::nexus::Nexus`].
///
/// Two hooks share a nexus iff their [`crate::Hook::nexus_id`] values are equal; this is the
/// entire contract of `nexus_id` required by §8 of the core's testable properties.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NexusId(u64);

impl NexusId {
    pub(crate) fn new() -> Self { Self(next_id()) }
}

impl fmt::Debug for NexusId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "NexusId({})", self.0) }
}

impl fmt::Display for NexusId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "nexus#{}", self.0) }
}

/// Stable identity of a [`crate::Hook`], independent of which nexus it currently points at.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HookId(u64);

impl HookId {
    pub(crate) fn new() -> Self { Self(next_id()) }
}

impl fmt::Debug for HookId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "HookId({})", self.0) }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "hook#{}", self.0) }
}
