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

//! A runnable walk-through of fusion, isolation, and the owner contract.
//!
//! Run with `cargo run --example showcase` (set `RUST_LOG=trace` to see the pipeline's own log
//! output alongside the printed narration).

use std::collections::BTreeMap;
use std::sync::Arc;

use nexus_core::{Hook, HookId, HookKey, LinkMode, NexusManager, Owner, Value};

/// A single-choice selector: `selected` must always be one of `options`.
struct Selection {
    selected: Hook<String>,
    options: Vec<&'static str>,
}

impl Owner for Selection {
    fn hooks(&self) -> BTreeMap<HookKey, HookId> {
        let mut map = BTreeMap::new();
        map.insert("selected".into(), self.selected.id());
        map
    }

    fn validate(&self, full_snapshot: &BTreeMap<HookKey, Box<dyn Value>>) -> Result<(), String> {
        let selected = full_snapshot.get("selected").unwrap().as_any().downcast_ref::<String>().unwrap();
        if self.options.contains(&selected.as_str()) {
            Ok(())
        } else {
            Err(format!("'{selected}' is not one of {:?}", self.options))
        }
    }

    fn label(&self) -> String { "Selection".into() }
}

impl Selection {
    fn new(mgr: &NexusManager, initial: &str, options: Vec<&'static str>) -> Arc<Self> {
        let selected = mgr.new_hook(initial.to_string());
        let owner = Arc::new(Selection { selected, options });
        owner.selected.attach_owner(owner.clone(), "selected");
        owner
    }
}

/// A "budget split" owner: writing either half derives the other so `spent + remaining` always
/// equals `total`.
struct BudgetSplit {
    spent: Hook<i64>,
    remaining: Hook<i64>,
    total: i64,
}

impl Owner for BudgetSplit {
    fn hooks(&self) -> BTreeMap<HookKey, HookId> {
        let mut map = BTreeMap::new();
        map.insert("spent".into(), self.spent.id());
        map.insert("remaining".into(), self.remaining.id());
        map
    }

    fn complete(&self, submitted: &BTreeMap<HookKey, Box<dyn Value>>) -> Result<BTreeMap<HookKey, Box<dyn Value>>, String> {
        let mut extra = BTreeMap::new();
        if let Some(spent) = submitted.get("spent").and_then(|v| v.as_any().downcast_ref::<i64>()) {
            if !submitted.contains_key("remaining") {
                extra.insert("remaining".to_string(), Box::new(self.total - spent) as Box<dyn Value>);
            }
        } else if let Some(remaining) = submitted.get("remaining").and_then(|v| v.as_any().downcast_ref::<i64>()) {
            if !submitted.contains_key("spent") {
                extra.insert("spent".to_string(), Box::new(self.total - remaining) as Box<dyn Value>);
            }
        }
        Ok(extra)
    }

    fn validate(&self, full_snapshot: &BTreeMap<HookKey, Box<dyn Value>>) -> Result<(), String> {
        let spent = *full_snapshot.get("spent").unwrap().as_any().downcast_ref::<i64>().unwrap();
        let remaining = *full_snapshot.get("remaining").unwrap().as_any().downcast_ref::<i64>().unwrap();
        if spent + remaining == self.total {
            Ok(())
        } else {
            Err(format!("spent + remaining must equal {}, got {}", self.total, spent + remaining))
        }
    }

    fn react_to_change(&self, affected_keys: &std::collections::BTreeSet<HookKey>) {
        println!("  (budget changed: {affected_keys:?})");
    }

    fn label(&self) -> String { "BudgetSplit".into() }
}

impl BudgetSplit {
    fn new(mgr: &NexusManager, total: i64, spent: i64) -> Arc<Self> {
        let spent_hook = mgr.new_hook(spent);
        let remaining_hook = mgr.new_hook(total - spent);
        let owner = Arc::new(BudgetSplit { spent: spent_hook, remaining: remaining_hook, total });
        owner.spent.attach_owner(owner.clone(), "spent");
        owner.remaining.attach_owner(owner.clone(), "remaining");
        owner
    }
}

fn main() {
    env_logger::init();
    let mgr = NexusManager::new();

    println!("== fusion & isolation ==");
    let a = mgr.new_hook(1i32);
    let b = mgr.new_hook(2i32);
    let c = mgr.new_hook(3i32);
    a.link(&b, LinkMode::UseSelf).unwrap();
    b.link(&c, LinkMode::UseSelf).unwrap();
    println!("after fusing a-b-c: a={} b={} c={}", a.read(), b.read(), c.read());
    a.submit(10).unwrap();
    println!("after a.submit(10): a={} b={} c={}", a.read(), b.read(), c.read());
    b.isolate().unwrap();
    a.submit(20).unwrap();
    println!("after isolating b, a.submit(20): a={} b={} c={}", a.read(), b.read(), c.read());

    println!("\n== owner validation blocking fusion ==");
    let sel1 = Selection::new(&mgr, "red", vec!["red", "green", "blue"]);
    let sel2 = Selection::new(&mgr, "yellow", vec!["yellow", "orange"]);
    match sel1.selected.link(&sel2.selected, LinkMode::UseOther) {
        Ok(()) => println!("fusion unexpectedly succeeded"),
        Err(e) => println!("fusion rejected as expected: {e}"),
    }

    println!("\n== owner completion ==");
    let budget = BudgetSplit::new(&mgr, 100, 30);
    println!("initial: spent={} remaining={}", budget.spent.read(), budget.remaining.read());
    budget.spent.submit(45).unwrap();
    println!("after spent.submit(45): spent={} remaining={}", budget.spent.read(), budget.remaining.read());
}
