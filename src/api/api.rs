use super::global_slot_chain;
use crate::base::{
    Context, ContextPtr, Entry, EntryInput, EntryStrongPtr, Node, ParamsList, ParamsMap,
    ResourceType, ResourceWrapper, SlotChain, TokenResult, TrafficType, DEFAULT_CONTEXT_NAME,
};
use crate::{stat, Error, Result};
use std::sync::{Arc, RwLock};

/// Enters (creates) an invocation-chain context. Contexts entered with the
/// same name share one entrance node. The context must stay on the thread of
/// execution that entered it; its lifetime ends when the outermost entry
/// exits and the pointer is dropped.
pub fn enter_context(name: &str, origin: &str) -> ContextPtr {
    let mut ctx = Context::new(name.into(), origin.into());
    ctx.set_entrance_node(stat::get_or_create_entrance_node(name) as Arc<dyn Node>);
    Arc::new(RwLock::new(ctx))
}

/// EntryBuilder is the basic API of the runtime: it describes one guarded
/// call and builds the entry running the slot chain.
pub struct EntryBuilder {
    resource_name: String,
    resource_type: ResourceType,
    traffic_type: TrafficType,
    batch_count: u32,
    prioritized: bool,
    context: Option<ContextPtr>,
    slot_chain: Arc<SlotChain>,
    args: Option<ParamsList>,
    attachments: Option<ParamsMap>,
}

impl EntryBuilder {
    pub fn new(resource_name: String) -> Self {
        EntryBuilder {
            resource_name,
            resource_type: ResourceType::default(),
            traffic_type: TrafficType::default(),
            batch_count: 1,
            prioritized: false,
            context: None,
            slot_chain: global_slot_chain(),
            args: None,
            attachments: None,
        }
    }

    /// `build()` consumes the builder, runs the slot chain, and returns the
    /// entered entry, or the block error when the call was rejected.
    pub fn build(self) -> Result<EntryStrongPtr> {
        let ctx = self
            .context
            .unwrap_or_else(|| enter_context(DEFAULT_CONTEXT_NAME, ""));

        let mut input = EntryInput::new(self.batch_count, self.prioritized);
        if let Some(args) = self.args {
            input.set_args(args);
        }
        if let Some(attachments) = self.attachments {
            input.set_attachments(attachments);
        }

        let entry = Entry::new(
            Arc::clone(&ctx),
            ResourceWrapper::new(self.resource_name, self.resource_type, self.traffic_type),
            input,
            Arc::clone(&self.slot_chain),
        );
        let entry = Arc::new(RwLock::new(entry));
        ctx.write().unwrap().push_entry(Arc::downgrade(&entry));

        let r = self.slot_chain.entry(&mut entry.write().unwrap());
        let entry = EntryStrongPtr::new(entry);
        match r {
            TokenResult::Blocked(_) => {
                // unwind the blocked entry from the context stack
                entry.exit().ok();
                Err(Error::msg(r.to_string()))
            }
            _ => Ok(entry),
        }
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn with_traffic_type(mut self, traffic_type: TrafficType) -> Self {
        self.traffic_type = traffic_type;
        self
    }

    pub fn with_batch_count(mut self, batch_count: u32) -> Self {
        self.batch_count = batch_count;
        self
    }

    /// Prioritized requests may pre-occupy quota of upcoming windows instead
    /// of being rejected outright.
    pub fn with_prioritized(mut self, prioritized: bool) -> Self {
        self.prioritized = prioritized;
        self
    }

    /// Attaches the entry to an explicitly entered context; without one the
    /// entry runs in a fresh default context.
    pub fn with_context(mut self, context: ContextPtr) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_slot_chain(mut self, slot_chain: Arc<SlotChain>) -> Self {
        self.slot_chain = slot_chain;
        self
    }

    pub fn with_args(mut self, args: Option<ParamsList>) -> Self {
        self.args = args;
        self
    }

    pub fn with_attachments(mut self, attachments: Option<ParamsMap>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Records a business error of the entered call. The error feeds the
/// exception counters (and thereby circuit breaking) without rejecting the
/// call.
pub fn trace_error(entry: &EntryStrongPtr, err: Error) {
    {
        let entry = entry.inner().read().unwrap();
        let count = entry.input().batch_count();
        if let Some(node) = entry.cur_node() {
            node.increase_exception(count);
        }
        if let Some(node) = entry.origin_node() {
            node.increase_exception(count);
        }
        if entry.resource().traffic_type() == TrafficType::Inbound {
            stat::inbound_node().increase_exception(count);
        }
    }
    entry.set_err(err);
}

pub type FallbackFn<T> = Box<dyn FnOnce(&Error) -> Result<T>>;

/// Wraps a business closure with an entry: enter before, exit after, trace
/// errors accepted by `trace_filter`, and route rejections and failures to
/// the fallback when one is given.
pub fn run_protected_with_trace_filter<T>(
    builder: EntryBuilder,
    trace_filter: impl Fn(&Error) -> bool,
    biz: impl FnOnce() -> Result<T>,
    fallback: Option<FallbackFn<T>>,
) -> Result<T> {
    match builder.build() {
        Ok(entry) => {
            let res = biz();
            match res {
                Ok(v) => {
                    entry.exit().ok();
                    Ok(v)
                }
                Err(err) => {
                    if trace_filter(&err) {
                        trace_error(&entry, Error::msg(err.to_string()));
                    }
                    entry.exit().ok();
                    match fallback {
                        Some(f) => f(&err),
                        None => Err(err),
                    }
                }
            }
        }
        Err(block_err) => match fallback {
            Some(f) => f(&block_err),
            None => Err(block_err),
        },
    }
}

/// `run_protected` traces every business error; see
/// `run_protected_with_trace_filter`.
pub fn run_protected<T>(
    builder: EntryBuilder,
    biz: impl FnOnce() -> Result<T>,
    fallback: Option<FallbackFn<T>>,
) -> Result<T> {
    run_protected_with_trace_filter(builder, |_| true, biz, fallback)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{
        BlockType, MockRuleCheckSlot, MockStatPrepareSlot, MockStatSlot,
    };
    use mockall::Sequence;

    fn chain_passing() -> Arc<SlotChain> {
        let mut ps = Arc::new(MockStatPrepareSlot::new());
        let mut rcs = Arc::new(MockRuleCheckSlot::new());
        let mut ssm = Arc::new(MockStatSlot::new());
        let mut seq = Sequence::new();
        Arc::get_mut(&mut ps)
            .unwrap()
            .expect_prepare()
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        Arc::get_mut(&mut rcs)
            .unwrap()
            .expect_check()
            .once()
            .in_sequence(&mut seq)
            .returning(|_entry| TokenResult::new_pass());
        Arc::get_mut(&mut ssm)
            .unwrap()
            .expect_on_entry_pass()
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        Arc::get_mut(&mut ssm)
            .unwrap()
            .expect_on_completed()
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        let mut sc = SlotChain::new();
        sc.add_stat_prepare_slot(ps);
        sc.add_rule_check_slot(rcs);
        sc.add_stat_slot(ssm);
        Arc::new(sc)
    }

    fn chain_blocking() -> Arc<SlotChain> {
        let mut rcs = Arc::new(MockRuleCheckSlot::new());
        let mut ssm = Arc::new(MockStatSlot::new());
        Arc::get_mut(&mut rcs)
            .unwrap()
            .expect_check()
            .once()
            .returning(|_entry| TokenResult::new_blocked(BlockType::Flow));
        Arc::get_mut(&mut ssm)
            .unwrap()
            .expect_on_entry_blocked()
            .once()
            .return_const(());
        Arc::get_mut(&mut ssm)
            .unwrap()
            .expect_on_completed()
            .never()
            .return_const(());
        let mut sc = SlotChain::new();
        sc.add_rule_check_slot(rcs);
        sc.add_stat_slot(ssm);
        Arc::new(sc)
    }

    #[test]
    fn pass() {
        let builder = EntryBuilder::new("api_pass".into()).with_slot_chain(chain_passing());
        let entry = builder.build().unwrap();
        entry.exit().unwrap();
    }

    #[test]
    fn block() {
        let builder = EntryBuilder::new("api_block".into()).with_slot_chain(chain_blocking());
        assert!(builder.build().is_err());
    }

    #[test]
    fn run_protected_fallback_on_block() {
        let builder =
            EntryBuilder::new("api_protected_block".into()).with_slot_chain(chain_blocking());
        let res = run_protected(
            builder,
            || Ok::<_, Error>(1),
            Some(Box::new(|_err| Ok(-1))),
        );
        assert_eq!(res.unwrap(), -1);
    }

    #[test]
    fn run_protected_biz_error_propagates() {
        let builder =
            EntryBuilder::new("api_protected_err".into()).with_slot_chain(chain_passing());
        let res: Result<i32> = run_protected(builder, || Err(Error::msg("boom")), None);
        assert_eq!(res.unwrap_err().to_string(), "boom");
    }

    #[test]
    fn nested_entries_exit_in_order() {
        let ctx = enter_context("api_nested", "");
        let outer = EntryBuilder::new("api_nested_outer".into())
            .with_context(Arc::clone(&ctx))
            .with_slot_chain(chain_passing())
            .build()
            .unwrap();
        let inner = EntryBuilder::new("api_nested_inner".into())
            .with_context(Arc::clone(&ctx))
            .with_slot_chain(chain_passing())
            .build()
            .unwrap();
        assert_eq!(ctx.read().unwrap().depth(), 2);
        inner.exit().unwrap();
        outer.exit().unwrap();
        assert_eq!(ctx.read().unwrap().depth(), 0);
    }
}
