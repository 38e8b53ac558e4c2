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

//! Six numbered end-to-end scenarios exercising chained fusion, isolation, validation-blocked
//! fusion, owner-driven atomic multi-submission, function completion, and nested-submission
//! rejection.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use nexus_core::{HookId, HookKey, LinkMode, NexusManager, Owner, SubmitError, Value};

/// Scenario 1: chain write. A-B-C fuse into one nexus; a write from any of them is seen by all.
#[test]
fn chain_write() {
    let mgr = NexusManager::new();
    let a = mgr.new_hook(1i32);
    let b = mgr.new_hook(2i32);
    let c = mgr.new_hook(3i32);

    a.link(&b, LinkMode::UseSelf).unwrap();
    b.link(&c, LinkMode::UseSelf).unwrap();

    assert_eq!(a.read(), 1);
    assert_eq!(b.read(), 1);
    assert_eq!(c.read(), 1);

    a.submit(10).unwrap();
    assert_eq!(a.read(), 10);
    assert_eq!(b.read(), 10);
    assert_eq!(c.read(), 10);

    c.submit(20).unwrap();
    assert_eq!(a.read(), 20);
    assert_eq!(b.read(), 20);
    assert_eq!(c.read(), 20);
}

/// Scenario 2: middle isolation. Isolating B out of a fused {A, B, C} leaves A and C fused and
/// detaches B without further reacting to writes through A.
#[test]
fn middle_isolation() {
    let mgr = NexusManager::new();
    let a = mgr.new_hook(1i32);
    let b = mgr.new_hook(2i32);
    let c = mgr.new_hook(3i32);
    a.link(&b, LinkMode::UseSelf).unwrap();
    b.link(&c, LinkMode::UseSelf).unwrap();
    a.submit(10).unwrap();
    c.submit(20).unwrap();

    b.isolate().unwrap();
    assert!(a.is_linked_to(&c));
    assert!(!a.is_linked_to(&b));
    assert!(!b.is_linked_to(&c));

    a.submit(30).unwrap();
    assert_eq!(a.read(), 30);
    assert_eq!(c.read(), 30);
    assert_eq!(b.read(), 20);
}

/// A minimal "selection" owner: one `selected` hook and one `available` hook, whose invariant is
/// `selected ∈ available`.
struct Selection {
    selected: nexus_core::Hook<String>,
    available: nexus_core::Hook<BTreeSet<String>>,
}

impl Selection {
    fn new(mgr: &NexusManager, selected: &str, available: impl IntoIterator<Item = &'static str>) -> Arc<Self> {
        let selected_hook = mgr.new_hook(selected.to_string());
        let available_hook = mgr.new_hook(available.into_iter().map(str::to_string).collect::<BTreeSet<_>>());
        let owner = Arc::new(Selection { selected: selected_hook, available: available_hook });
        owner.selected.attach_owner(owner.clone(), "selected");
        owner.available.attach_owner(owner.clone(), "available");
        owner
    }
}

impl Owner for Selection {
    fn hooks(&self) -> BTreeMap<HookKey, HookId> {
        let mut map = BTreeMap::new();
        map.insert("selected".into(), self.selected.id());
        map.insert("available".into(), self.available.id());
        map
    }

    fn validate(&self, full_snapshot: &BTreeMap<HookKey, Box<dyn nexus_core::Value>>) -> Result<(), String> {
        let selected = full_snapshot
            .get("selected")
            .and_then(|v| v.as_any().downcast_ref::<String>())
            .expect("selected key always present");
        let available = full_snapshot
            .get("available")
            .and_then(|v| v.as_any().downcast_ref::<BTreeSet<String>>())
            .expect("available key always present");
        if available.contains(selected) {
            Ok(())
        } else {
            Err(format!("'{selected}' is not among the available options"))
        }
    }
}

/// Scenario 3: validation blocks fusion. Fusing two selections whose invariant would be violated
/// by the fused value is rejected, and both selections are left untouched.
#[test]
fn validation_blocks_fusion() {
    let mgr = NexusManager::new();
    let sel1 = Selection::new(&mgr, "red", ["red", "green", "blue"]);
    let sel2 = Selection::new(&mgr, "yellow", ["yellow", "orange"]);

    let err = sel1.selected.link(&sel2.selected, LinkMode::UseOther).unwrap_err();
    assert!(matches!(err, nexus_core::LinkError::FusionRejected(SubmitError::OwnerValidation { .. })));

    assert_eq!(sel1.selected.read(), "red");
    assert_eq!(sel2.selected.read(), "yellow");
    assert!(!sel1.selected.is_linked_to(&sel2.selected));
}

/// Scenario 4: owner-driven atomic multi-submit. A single `submit_many` across both of a
/// selection's hooks either commits both or neither.
#[test]
fn owner_driven_atomic_multi_submit() {
    let mgr = NexusManager::new();
    let sel = Selection::new(&mgr, "smartwatch", ["smartwatch", "laptop"]);

    mgr.submission()
        .with(&sel.selected, "smartwatch".to_string())
        .with(&sel.available, BTreeSet::from(["smartwatch".to_string(), "laptop".to_string()]))
        .commit()
        .unwrap();

    let err = mgr
        .submission()
        .with(&sel.selected, "laptop".to_string())
        .with(&sel.available, BTreeSet::from(["smartwatch".to_string(), "phone".to_string()]))
        .commit()
        .unwrap_err();
    assert!(matches!(err, SubmitError::OwnerValidation { .. }));

    assert_eq!(sel.selected.read(), "smartwatch");
    assert_eq!(sel.available.read(), BTreeSet::from(["smartwatch".to_string(), "laptop".to_string()]));
}

/// A "function" owner whose completion step enforces `x + y == 100` by deriving whichever of the
/// two hooks wasn't in the submission.
struct Sum100 {
    x: nexus_core::Hook<i64>,
    y: nexus_core::Hook<i64>,
}

impl Sum100 {
    fn new(mgr: &NexusManager, x: i64, y: i64) -> Arc<Self> {
        let x_hook = mgr.new_hook(x);
        let y_hook = mgr.new_hook(y);
        let owner = Arc::new(Sum100 { x: x_hook, y: y_hook });
        owner.x.attach_owner(owner.clone(), "x");
        owner.y.attach_owner(owner.clone(), "y");
        owner
    }
}

impl Owner for Sum100 {
    fn hooks(&self) -> BTreeMap<HookKey, HookId> {
        let mut map = BTreeMap::new();
        map.insert("x".into(), self.x.id());
        map.insert("y".into(), self.y.id());
        map
    }

    fn complete(
        &self,
        submitted: &BTreeMap<HookKey, Box<dyn nexus_core::Value>>,
    ) -> Result<BTreeMap<HookKey, Box<dyn nexus_core::Value>>, String> {
        let mut extra = BTreeMap::new();
        if let Some(x) = submitted.get("x").and_then(|v| v.as_any().downcast_ref::<i64>()) {
            if !submitted.contains_key("y") {
                extra.insert("y".to_string(), Box::new(100 - x) as Box<dyn nexus_core::Value>);
            }
        } else if let Some(y) = submitted.get("y").and_then(|v| v.as_any().downcast_ref::<i64>()) {
            if !submitted.contains_key("x") {
                extra.insert("x".to_string(), Box::new(100 - y) as Box<dyn nexus_core::Value>);
            }
        }
        Ok(extra)
    }

    fn validate(&self, full_snapshot: &BTreeMap<HookKey, Box<dyn nexus_core::Value>>) -> Result<(), String> {
        let x = full_snapshot.get("x").and_then(|v| v.as_any().downcast_ref::<i64>()).copied().unwrap_or_default();
        let y = full_snapshot.get("y").and_then(|v| v.as_any().downcast_ref::<i64>()).copied().unwrap_or_default();
        if x + y == 100 {
            Ok(())
        } else {
            Err(format!("x + y must equal 100, got {x} + {y} = {}", x + y))
        }
    }
}

/// Scenario 5: function completion. Writing `x` alone triggers phase-2 completion that derives
/// `y`, and both commit atomically.
#[test]
fn function_completion() {
    let mgr = NexusManager::new();
    let sum = Sum100::new(&mgr, 30, 70);
    assert_eq!(sum.x.read() + sum.y.read(), 100);

    sum.x.submit(40).unwrap();
    assert_eq!(sum.x.read(), 40);
    assert_eq!(sum.y.read(), 60);
    assert_eq!(sum.x.read() + sum.y.read(), 100);
}

/// Scenario 6: nested submission rejected. A listener that tries to submit back into the manager
/// gets `NestedSubmission`; the outer submission still commits.
#[test]
fn nested_submission_rejected() {
    let mgr = NexusManager::new();
    let a = mgr.new_hook(1i32);
    let rejected = Arc::new(AtomicBool::new(false));
    let rejected2 = rejected.clone();
    let inner = a.clone();
    a.add_listener(Arc::new(move || {
        if matches!(inner.submit(99), Err(SubmitError::NestedSubmission)) {
            rejected2.store(true, Ordering::SeqCst);
        }
    }));

    a.submit(1).unwrap();
    assert!(rejected.load(Ordering::SeqCst));
    assert_eq!(a.read(), 1);
}

/// react_to_change fires exactly once per submission that touches an owner's hooks, even when two
/// of the owner's hooks are both affected.
#[test]
fn owner_react_to_change_fires_exactly_once() {
    struct Counting {
        hooks: BTreeMap<HookKey, HookId>,
        calls: AtomicUsize,
    }
    impl Owner for Counting {
        fn hooks(&self) -> BTreeMap<HookKey, HookId> { self.hooks.clone() }
        fn react_to_change(&self, _affected_keys: &BTreeSet<HookKey>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    let mgr = NexusManager::new();
    let x = mgr.new_hook(1i32);
    let y = mgr.new_hook(2i32);
    let mut hooks = BTreeMap::new();
    hooks.insert("x".to_string(), x.id());
    hooks.insert("y".to_string(), y.id());
    let owner = Arc::new(Counting { hooks, calls: AtomicUsize::new(0) });
    x.attach_owner(owner.clone(), "x");
    y.attach_owner(owner.clone(), "y");

    mgr.submission().with(&x, 10).with(&y, 20).commit().unwrap();
    assert_eq!(owner.calls.load(Ordering::SeqCst), 1);
}
