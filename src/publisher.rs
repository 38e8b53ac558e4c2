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

//! Outbound, asynchronous-capable publication sinks (§4.4 phase 6.3, §6, §9 "Publisher
//! delivery").
//!
//! The core promises only that `enqueue` is called within the write lock; actual delivery,
//! scheduling, and cancellation belong to the publisher implementation and are out of scope here.

use alloc::string::String;
use alloc::sync::Arc;

use crate::id::HookId;
use crate::owner::HookKey;

/// What a publisher is told happened. Carries no value — publishers that need the new value
/// re-read it through the hook/owner API, outside the lock, the same way a listener would.
#[derive(Clone, Debug)]
pub enum PublicationEvent {
    /// A hook's nexus committed a new value.
    Hook(HookId),
    /// An owner observed a commit touching one or more of its hooks.
    Owner { label: String, keys: alloc::collections::BTreeSet<HookKey> },
}

/// A sink that receives [`PublicationEvent`]s enqueued during phase 6.
///
/// `enqueue` runs under the manager's write lock and must not block; implementations typically
/// push onto a channel or a lock-free queue and let a separate worker drain it.
pub trait Publisher: Send + Sync {
    fn enqueue(&self, event: PublicationEvent);
}

pub(crate) type PublisherHandle = Arc<dyn Publisher>;
