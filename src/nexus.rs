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

//! The nexus: a single shared storage cell (§3, §4.1).
//!
//! `Nexus` itself never takes the manager lock and never calls an owner or a hook back; it is
//! pure bookkeeping, manipulated exclusively by [`crate::manager::NexusManager`] while the lock is
//! held. Per-member isolated validators and reactions are *not* materialized as a separate
//! aggregate here: §4.1 asks for "aggregation of validators and reactions contributed by its
//! member hooks", but since `members` is already the authoritative membership set, the manager
//! derives the aggregate on demand by walking `members` and looking each one up in its hook
//! table. This removes an entire class of bug where a fusion or isolation updates membership but
//! forgets to also update a separately-tracked aggregate.

use indexmap::IndexSet;

use crate::id::HookId;
use crate::value::Value;

/// Internal storage cell. See the module doc for why validators/reactions aren't stored here.
pub(crate) struct Nexus {
    current: Box<dyn Value>,
    previous: Option<Box<dyn Value>>,
    members: IndexSet<HookId>,
}

impl Nexus {
    pub(crate) fn new(initial: Box<dyn Value>, owner_hook: HookId) -> Self {
        let mut members = IndexSet::with_capacity(1);
        members.insert(owner_hook);
        Self { current: initial, previous: None, members }
    }

    pub(crate) fn current(&self) -> &dyn Value { self.current.as_ref() }

    pub(crate) fn previous(&self) -> Option<&dyn Value> { self.previous.as_deref() }

    pub(crate) fn members(&self) -> &IndexSet<HookId> { &self.members }

    pub(crate) fn member_count(&self) -> usize { self.members.len() }

    /// Returns `true` if `hook` was indeed a member (and has now been removed).
    pub(crate) fn remove_member(&mut self, hook: HookId) -> bool { self.members.shift_remove(&hook) }

    /// Installs `new` as current, moving the prior current into `previous`. Only ever called by
    /// the manager during phase 5, or by the fusion path's equivalent commit step (§4.3 step 5).
    pub(crate) fn replace_value(&mut self, new: Box<dyn Value>) {
        let old = core::mem::replace(&mut self.current, new);
        self.previous = Some(old);
    }

    /// Absorbs another nexus's membership into this one, as the keeper side of a fusion
    /// (§4.3 step 5). The donor nexus is left with no members and should be dropped by the caller.
    pub(crate) fn absorb_members(&mut self, donor: &mut Nexus) {
        for hook in donor.members.drain(..) {
            self.members.insert(hook);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::HookId;

    fn hook() -> HookId { HookId::new() }

    #[test]
    fn new_nexus_has_single_member_and_no_previous() {
        let h = hook();
        let n = Nexus::new(Box::new(1i32), h);
        assert_eq!(n.member_count(), 1);
        assert!(n.members().contains(&h));
        assert!(n.previous().is_none());
        assert!(n.current().value_eq(&1i32));
    }

    #[test]
    fn replace_value_moves_old_into_previous() {
        let h = hook();
        let mut n = Nexus::new(Box::new(1i32), h);
        n.replace_value(Box::new(2i32));
        assert!(n.current().value_eq(&2i32));
        assert!(n.previous().unwrap().value_eq(&1i32));
    }

    #[test]
    fn remove_member_reports_whether_it_was_present() {
        let h1 = hook();
        let h2 = hook();
        let mut n = Nexus::new(Box::new(1i32), h1);
        assert!(!n.remove_member(h2));
        assert!(n.remove_member(h1));
        assert_eq!(n.member_count(), 0);
    }

    #[test]
    fn absorb_members_drains_the_donor() {
        let h1 = hook();
        let h2 = hook();
        let mut keeper = Nexus::new(Box::new(1i32), h1);
        let mut donor = Nexus::new(Box::new(2i32), h2);
        keeper.absorb_members(&mut donor);
        assert_eq!(donor.member_count(), 0);
        assert_eq!(keeper.member_count(), 2);
        assert!(keeper.members().contains(&h1));
        assert!(keeper.members().contains(&h2));
    }
}
