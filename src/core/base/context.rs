//! Per-invocation-chain state.

use super::{EntryWeakPtr, Node};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type ContextPtr = Arc<RwLock<Context>>;

pub type ParamKey = String;
pub type ParamsList = Vec<ParamKey>;
pub type ParamsMap = HashMap<String, ParamKey>;

/// One `Context` spans one logical invocation chain on one thread of
/// execution. All entries created under it share the entrance node and form
/// a stack: each enter pushes, each matching exit pops.
#[derive(Default)]
pub struct Context {
    name: String,
    /// origin of this chain (caller service); empty when unknown
    origin: String,
    /// entrance node shared by every chain entered with the same name
    entrance: Option<Arc<dyn Node>>,
    /// entry stack, the last element is the current entry
    entry_stack: Vec<EntryWeakPtr>,
}

impl Context {
    pub fn new(name: String, origin: String) -> Self {
        Context {
            name,
            origin,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn origin(&self) -> &String {
        &self.origin
    }

    pub fn set_entrance_node(&mut self, entrance: Arc<dyn Node>) {
        self.entrance = Some(entrance);
    }

    pub fn entrance_node(&self) -> Option<Arc<dyn Node>> {
        self.entrance.clone()
    }

    pub fn push_entry(&mut self, entry: EntryWeakPtr) {
        self.entry_stack.push(entry);
    }

    /// Pops the current entry. The caller must have verified it is exiting
    /// the top of the stack.
    pub fn pop_entry(&mut self) -> Option<EntryWeakPtr> {
        self.entry_stack.pop()
    }

    pub fn current_entry(&self) -> Option<&EntryWeakPtr> {
        self.entry_stack.last()
    }

    /// The entry right below the current one, i.e. the parent in the
    /// invocation tree.
    pub fn parent_entry(&self) -> Option<&EntryWeakPtr> {
        let len = self.entry_stack.len();
        if len >= 2 {
            self.entry_stack.get(len - 2)
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.entry_stack.len()
    }
}

/// Input of the policy checkers for a single call.
#[derive(Debug)]
pub struct EntryInput {
    batch_count: u32,
    /// prioritized requests may pre-occupy quota of future windows
    prioritized: bool,
    /// positional call arguments, consumed by the parameter flow module
    args: Option<ParamsList>,
    /// named call attachments, consumed by the parameter flow module
    attachments: Option<ParamsMap>,
}

impl Default for EntryInput {
    fn default() -> Self {
        EntryInput {
            batch_count: 1,
            prioritized: false,
            args: None,
            attachments: None,
        }
    }
}

impl EntryInput {
    pub fn new(batch_count: u32, prioritized: bool) -> Self {
        EntryInput {
            batch_count,
            prioritized,
            ..Default::default()
        }
    }

    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }

    pub fn prioritized(&self) -> bool {
        self.prioritized
    }

    pub fn set_args(&mut self, args: ParamsList) {
        self.args = Some(args);
    }

    pub fn args(&self) -> Option<&ParamsList> {
        self.args.as_ref()
    }

    pub fn set_attachments(&mut self, attachments: ParamsMap) {
        self.attachments = Some(attachments);
    }

    pub fn attachments(&self) -> Option<&ParamsMap> {
        self.attachments.as_ref()
    }
}
