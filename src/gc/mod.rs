//! Tri-generational tracing collector for variables.
//!
//! The algorithm follows the classic deferred reference counting scheme:
//! every tracked variable and everything reachable from it is staged, the
//! internal edges between staged variables are counted into each cell's
//! `gc_ref`, and a variable whose counted references account for its entire
//! strong count is only referenced from inside the graph. Everything else is
//! externally reachable and spared, together with its transitive closure.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::value::{SharedHandle, SharedOwned, Value};
use crate::variable::{VarPtr, Variable};

/// Visitor over variables discovered while walking a value graph. The
/// return value decides whether the walk descends into the visited
/// variable's own value. `visit_shared` is consulted at every refcounted
/// boundary (function or opaque); reachability walks cross it
/// unconditionally, while the edge-accounting pass takes over there.
pub trait VarVisitor {
    fn visit(&mut self, var: &VarPtr) -> bool;

    fn visit_shared(&mut self, handle: SharedHandle<'_>) -> bool {
        let _ = handle;
        true
    }
}

impl<F: FnMut(&VarPtr) -> bool> VarVisitor for F {
    fn visit(&mut self, var: &VarPtr) -> bool {
        self(var)
    }
}

/// Visit one variable and, if the visitor asks for it, the variables held
/// by its value. References and opaque host objects use this to expose
/// their outgoing edges.
pub fn visit_variable(var: &VarPtr, visitor: &mut dyn VarVisitor) {
    if visitor.visit(var) {
        var.value().for_each_variable(visitor);
    }
}

/// Number of generations: nursery, young, old.
pub const GENERATION_COUNT: usize = 3;

/// Unreachable variables are overwritten with this scalar before they are
/// dropped, so that destruction never runs into a live cycle.
const DEFUNCT_SENTINEL: i64 = 0x7EED_FACE_CAFE_BEEF_u64 as i64;

const POOL_LIMIT: usize = 256;

struct Tally {
    seen: usize,
    handle: SharedOwned,
}

/// The edge-accounting visitor of phase 2. Each shared handle keeps one
/// stored clone here, which the completion test compensates for.
#[derive(Default)]
struct EdgeCounter {
    tallies: HashMap<usize, Tally>,
    worklist: Vec<usize>,
}

impl VarVisitor for EdgeCounter {
    fn visit(&mut self, var: &VarPtr) -> bool {
        var.add_gc_ref(1);
        false
    }

    fn visit_shared(&mut self, handle: SharedHandle<'_>) -> bool {
        let key = handle.key();
        let entry = self.tallies.entry(key).or_insert_with(|| Tally {
            seen: 0,
            handle: handle.to_owned(),
        });
        entry.seen += 1;
        if entry.seen + 1 == handle.strong_count() {
            self.worklist.push(key);
        }
        false
    }
}

struct Collector {
    tracked: HashMap<usize, VarPtr>,
    counter: usize,
    threshold: usize,
}

impl Collector {
    fn new(threshold: usize) -> Self {
        Self {
            tracked: HashMap::new(),
            counter: 0,
            threshold,
        }
    }
}

pub struct GarbageCollector {
    gens: [Collector; GENERATION_COUNT],
    pool: Vec<VarPtr>,
    collecting: bool,
}

fn key_of(var: &VarPtr) -> usize {
    Rc::as_ptr(var) as usize
}

impl GarbageCollector {
    pub fn new(thresholds: [usize; GENERATION_COUNT]) -> Self {
        Self {
            gens: [
                Collector::new(thresholds[0]),
                Collector::new(thresholds[1]),
                Collector::new(thresholds[2]),
            ],
            pool: Vec::new(),
            collecting: false,
        }
    }

    /// The only way to obtain a variable. The new cell enters the nursery;
    /// crossing the nursery threshold triggers a collection opportunistically.
    pub fn create_variable(&mut self) -> VarPtr {
        let var = self.pool.pop().unwrap_or_else(Variable::new_untracked);
        var.wipe(Value::Null);
        self.gens[0].tracked.insert(key_of(&var), var.clone());
        self.gens[0].counter += 1;
        if self.gens[0].counter > self.gens[0].threshold {
            self.collect_cascade(0);
        }
        var
    }

    /// Collect the given generation and any tied generation whose counter
    /// crossed its threshold as a result of promotion. Iterative, and
    /// guarded against reentrance.
    pub fn collect_cascade(&mut self, generation: usize) {
        if self.collecting {
            return;
        }
        self.collecting = true;
        let mut gen = Some(generation);
        while let Some(current) = gen {
            gen = self.collect_single(current);
        }
        self.collecting = false;
    }

    /// Collect every generation, youngest first so that survivors are
    /// examined again in the generation they are promoted into.
    pub fn collect_all(&mut self) {
        for gen in 0..GENERATION_COUNT {
            if self.collecting {
                return;
            }
            self.collecting = true;
            self.collect_single(gen);
            self.collecting = false;
        }
    }

    pub fn tracked_count(&self, generation: usize) -> usize {
        self.gens[generation].tracked.len()
    }

    pub fn total_tracked(&self) -> usize {
        self.gens.iter().map(|c| c.tracked.len()).sum()
    }

    fn collect_single(&mut self, gen: usize) -> Option<usize> {
        debug!(
            generation = gen,
            tracked = self.gens[gen].tracked.len(),
            "garbage collection begins"
        );
        let defunct = Value::Integer(DEFUNCT_SENTINEL);
        let mut staging: HashMap<usize, VarPtr> = HashMap::new();

        // Phase 1: stage every tracked variable and everything reachable
        // from one. A tracked root carries two bookkeeping references (the
        // tracked set and the staging map), a child only the staging one.
        for (key, root) in &self.gens[gen].tracked {
            root.reset_gc_ref(2);
            if staging.insert(*key, root.clone()).is_some() {
                continue;
            }
            if Rc::strong_count(root) <= 2 {
                // The bookkeeping references are the last ones.
                root.wipe(defunct.clone());
                continue;
            }
            let mut stage = |child: &VarPtr| -> bool {
                let child_key = key_of(child);
                if staging.contains_key(&child_key) {
                    return false;
                }
                child.reset_gc_ref(1);
                staging.insert(child_key, child.clone());
                true
            };
            root.value().for_each_variable(&mut stage);
        }

        // Phase 2: count one share per internal edge. Variables only ever
        // sit behind refcounted handles (functions, opaques), so an edge
        // is attributed once per handle, and only once every strong count
        // of that handle has been sighted inside the staged graph. A
        // handle aliased from outside never completes its tally, which
        // leaves its children under-counted and therefore reachable. A
        // variable whose counted shares reach its strong count is
        // referenced from inside the staged graph only.
        let mut counter = EdgeCounter::default();
        for var in staging.values() {
            if var.value().is_scalar() {
                continue;
            }
            var.value().for_each_variable(&mut counter);
        }
        while let Some(key) = counter.worklist.pop() {
            let handle = counter.tallies[&key].handle.clone();
            handle.as_handle().walk(&mut counter);
        }
        drop(counter);

        // Phase 3: mark externally reachable variables and their closure.
        for var in staging.values() {
            if var.gc_ref() < 0 || var.gc_ref() >= Rc::strong_count(var) as i64 {
                continue;
            }
            var.reset_gc_ref(-1);
            let mut mark = |child: &VarPtr| -> bool {
                if child.gc_ref() < 0 {
                    return false;
                }
                child.reset_gc_ref(-1);
                true
            };
            var.value().for_each_variable(&mut mark);
        }

        // Phase 4: wipe unmarked variables to break cycles, then drop them
        // from the tracked set; promote marked survivors into the tied
        // next generation.
        let tied = gen + 1 < GENERATION_COUNT;
        let mut dead = Vec::new();
        let mut promote = Vec::new();
        for (key, var) in &staging {
            if var.gc_ref() >= 0 {
                trace!("collecting unreachable variable");
                var.wipe(defunct.clone());
                dead.push(*key);
            } else if tied && self.gens[gen].tracked.contains_key(key) {
                promote.push(*key);
            }
        }
        for key in dead {
            if let Some(var) = self.gens[gen].tracked.remove(&key) {
                if self.pool.len() < POOL_LIMIT {
                    self.pool.push(var);
                }
            }
        }
        let mut next = None;
        for key in promote {
            if let Some(var) = self.gens[gen].tracked.remove(&key) {
                self.gens[gen + 1].tracked.insert(key, var);
                self.gens[gen + 1].counter += 1;
                if self.gens[gen + 1].counter > self.gens[gen + 1].threshold {
                    next = Some(gen + 1);
                }
            }
        }
        self.gens[gen].counter = 0;
        debug!(
            generation = gen,
            tracked = self.gens[gen].tracked.len(),
            "garbage collection ends"
        );
        next
    }
}
