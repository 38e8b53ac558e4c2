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

//! A reactive value-synchronization core.
//!
//! Independent runtime objects hold [`Hook`]s into shared storage cells called [`Nexus`](nexus::Nexus)es.
//! Any number of hooks can be *fused* ([`Hook::link`]) into a single nexus so that a write through
//! one of them is observed by all the others; isolating a hook ([`Hook::isolate`]) detaches it
//! again without disturbing the rest of the fused group. Every write runs through the
//! [`NexusManager`]'s six-phase submission pipeline, which collects the nexuses a submission
//! touches, lets isolated validators and [`Owner`] cross-hook validators veto it, commits, and then
//! dispatches reactions, publications, and listeners in a fixed order.
//!
//! See `DESIGN.md` at the repository root for where each piece of this implementation is
//! grounded.

#![deny(
    dead_code,
    // TODO: Complete documentation
    // missing_docs,
    unused_variables,
    unused_mut,
    unused_imports,
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case
)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

#[macro_use]
extern crate amplify;

mod id;
mod value;
mod nexus;
mod listener;
mod publisher;
mod owner;
mod hook;
mod error;
mod manager;

pub use error::{IsolateError, LinkError, SubmitError};
pub use hook::{Hook, HookBuilder, Reaction, Validator};
pub use id::{HookId, NexusId};
pub use listener::Listener;
pub use manager::{LinkMode, ManagerConfig, NexusManager, OwnerSideChannel, SubmitFlags, Submission};
pub use owner::{HookKey, Owner};
pub use publisher::{PublicationEvent, Publisher};
pub use value::Value;
