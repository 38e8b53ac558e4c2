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

use crate::id::{HookId, NexusId};

/// Failure of a `NexusManager::submit_many` (and, by extension, `Hook::submit`) call.
///
/// Covers phases 1-4 of the submission pipeline (§4.4 and §7 of the design notes); a failure at
/// any of these phases leaves the data model exactly as it was before the call (§7, "User-visible
/// failure behavior"). Phase 5/6 are defined not to fail: a commit-time error there is a bug, not
/// a reportable condition.
#[derive(Clone, Debug, Display, Error)]
#[display(doc_comments)]
pub enum SubmitError {
    /// two hooks sharing nexus {0} were submitted with different candidate values in one call
    ValueConflict(NexusId),

    /// hook {hook}'s isolated validator rejected the candidate: {message}
    IsolatedValidation { hook: HookId, message: String },

    /// owner '{owner}' rejected the proposed snapshot: {message}
    OwnerValidation { owner: String, message: String },

    /// owner '{owner}''s completion step failed: {message}
    CompletionFailure { owner: String, message: String },

    /// a phase-6 callback attempted to start a nested submission
    NestedSubmission,

    /// hook {0} no longer exists
    DeadHook(HookId),

    /// nexus {0} no longer exists
    DeadNexus(NexusId),
}

/// Failure of [`crate::Hook::link`] / [`crate::Hook::link_many`].
///
/// Wraps the same underlying validation failure a plain submission would have produced, applied
/// instead to the virtual submission §4.3 describes for fusion: "same underlying kind as
/// IsolatedValidation/OwnerValidation, wrapped" (§7).
#[derive(Clone, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum LinkError {
    /// fusion rejected: {0}
    #[from]
    FusionRejected(SubmitError),
}

/// Failure of [`crate::Hook::isolate`].
///
/// `EmptyIsolation` is defined for API completeness but is never constructed by this
/// implementation, which treats isolating a singleton nexus as a no-op.
#[derive(Clone, Debug, Display, Error)]
#[display(doc_comments)]
pub enum IsolateError {
    /// hook {0} no longer exists
    DeadHook(HookId),

    /// isolate() called on a nexus with a single member
    EmptyIsolation,

    /// a phase-6 callback attempted to start a nested isolation
    NestedSubmission,
}
