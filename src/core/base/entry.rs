use super::{ContextPtr, EntryInput, Node, ResourceWrapper, SlotChain, TokenResult};
use crate::utils::curr_time_millis;
use crate::{logging, Error, Result};
use std::sync::{Arc, RwLock, Weak};

pub type ExitHandler = Box<dyn Send + Sync + Fn(&Entry) -> Result<()>>;

type EntryStrongPtrInner = Arc<RwLock<Entry>>;
/// Owning handle of an entered call, returned by the entry builder.
pub struct EntryStrongPtr(EntryStrongPtrInner);
pub type EntryWeakPtr = Weak<RwLock<Entry>>;

pub const ERROR_ENTRY_FREE: &str =
    "the order of entry exits does not match the order of entries";

/// One guarded call. Entries are stacked inside their `Context`; each one
/// traverses the slot chain on enter and in reverse on exit.
pub struct Entry {
    ctx: ContextPtr,
    /// the global slot chain is shared, hence `Arc`
    sc: Arc<SlotChain>,
    resource: ResourceWrapper,
    input: EntryInput,
    create_time: u64,
    round_trip: u64,
    /// per-(context, resource) statistic node, set by the node selector slot
    cur_node: Option<Arc<dyn Node>>,
    /// per-origin statistic node, set by the cluster builder slot
    origin_node: Option<Arc<dyn Node>>,
    /// outcome of the rule-check slots
    result: TokenResult,
    err: Option<Error>,
    /// set when a prioritized request pre-occupied its pass in a future window
    pass_pre_occupied: bool,
    exited: bool,
    exit_handlers: Vec<ExitHandler>,
}

impl Entry {
    pub fn new(
        ctx: ContextPtr,
        resource: ResourceWrapper,
        input: EntryInput,
        sc: Arc<SlotChain>,
    ) -> Self {
        Entry {
            ctx,
            sc,
            resource,
            input,
            create_time: curr_time_millis(),
            round_trip: 0,
            cur_node: None,
            origin_node: None,
            result: TokenResult::new_pass(),
            err: None,
            pass_pre_occupied: false,
            exited: false,
            exit_handlers: Vec::new(),
        }
    }

    pub fn context(&self) -> &ContextPtr {
        &self.ctx
    }

    pub fn resource(&self) -> &ResourceWrapper {
        &self.resource
    }

    pub fn input(&self) -> &EntryInput {
        &self.input
    }

    pub fn create_time(&self) -> u64 {
        self.create_time
    }

    pub fn round_trip(&self) -> u64 {
        self.round_trip
    }

    pub fn set_round_trip(&mut self, round_trip: u64) {
        self.round_trip = round_trip;
    }

    pub fn set_cur_node(&mut self, node: Arc<dyn Node>) {
        self.cur_node = Some(node);
    }

    pub fn cur_node(&self) -> Option<Arc<dyn Node>> {
        self.cur_node.clone()
    }

    pub fn set_origin_node(&mut self, node: Arc<dyn Node>) {
        self.origin_node = Some(node);
    }

    pub fn origin_node(&self) -> Option<Arc<dyn Node>> {
        self.origin_node.clone()
    }

    pub fn set_result(&mut self, result: TokenResult) {
        self.result = result;
    }

    pub fn reset_result_to_pass(&mut self) {
        self.result.reset_to_pass();
    }

    pub fn result(&self) -> &TokenResult {
        &self.result
    }

    pub fn is_blocked(&self) -> bool {
        self.result.is_blocked()
    }

    pub fn set_err(&mut self, err: Error) {
        self.err = Some(err);
    }

    pub fn get_err(&self) -> &Option<Error> {
        &self.err
    }

    pub fn set_pass_pre_occupied(&mut self, pre_occupied: bool) {
        self.pass_pre_occupied = pre_occupied;
    }

    pub fn pass_pre_occupied(&self) -> bool {
        self.pass_pre_occupied
    }

    pub fn when_exit(&mut self, exit_handler: ExitHandler) {
        self.exit_handlers.push(exit_handler);
    }

    fn exit_once(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        for handler in &self.exit_handlers {
            if let Err(err) = handler(self) {
                logging::error!("Entry exit handler failed: {}", err);
            }
        }
        let sc = Arc::clone(&self.sc);
        sc.exit(self);
    }
}

impl EntryStrongPtr {
    pub fn new(entry: EntryStrongPtrInner) -> EntryStrongPtr {
        EntryStrongPtr(entry)
    }

    pub fn context(&self) -> ContextPtr {
        Arc::clone(self.0.read().unwrap().context())
    }

    pub fn inner(&self) -> &EntryStrongPtrInner {
        &self.0
    }

    pub fn set_err(&self, err: Error) {
        self.0.write().unwrap().set_err(err);
    }

    pub fn is_blocked(&self) -> bool {
        self.0.read().unwrap().is_blocked()
    }

    /// Exits the call. Must be the last-in entry of its context; when it is
    /// not, all entries stacked above it are force-exited first and a
    /// distinct error is returned.
    pub fn exit(&self) -> Result<()> {
        let ctx = self.context();
        let mut unwound: Vec<EntryStrongPtrInner> = Vec::new();
        let mut found = false;
        {
            let mut ctx_w = ctx.write().unwrap();
            while let Some(weak) = ctx_w.pop_entry() {
                match weak.upgrade() {
                    Some(strong) => {
                        if Arc::ptr_eq(&strong, &self.0) {
                            found = true;
                            break;
                        }
                        unwound.push(strong);
                    }
                    // dangling entries cannot be exited, drop them silently
                    None => continue,
                }
            }
        }
        if !found {
            logging::error!("Entry.exit(): entry is not present in its context");
            return Err(Error::msg(ERROR_ENTRY_FREE));
        }
        // deepest entries first, matching reverse entering order
        for e in &unwound {
            e.write().unwrap().exit_once();
        }
        self.0.write().unwrap().exit_once();
        if unwound.is_empty() {
            Ok(())
        } else {
            Err(Error::msg(ERROR_ENTRY_FREE))
        }
    }
}
