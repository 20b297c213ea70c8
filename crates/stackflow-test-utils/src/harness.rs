use stackflow_bytecode::{BlockId, Function, Op};
use stackflow_index::MemIndex;
use stackflow_interp::{CollectedInfo, EffectFlags, Interp, Options, Result, RunFlags, State};

/// Install a test-writer subscriber filtered by `RUST_LOG`. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What interpreting one block produced.
#[derive(Debug)]
pub struct Outcome {
    pub flags: RunFlags,
    /// The state after the last instruction interpreted.
    pub state: State,
    /// Every state handed to a successor, in order.
    pub propagated: Vec<(BlockId, State)>,
}

impl Outcome {
    /// The states propagated to `block`.
    pub fn to(&self, block: BlockId) -> Vec<&State> {
        self.propagated
            .iter()
            .filter(|(b, _)| *b == block)
            .map(|(_, s)| s)
            .collect()
    }

    pub fn targets(&self) -> Vec<BlockId> {
        self.propagated.iter().map(|(b, _)| *b).collect()
    }
}

/// Owns everything an [`Interp`] borrows so tests can interpret a block in
/// one call.
pub struct Harness {
    pub func: Function,
    pub index: MemIndex,
    pub options: Options,
    pub collect: CollectedInfo,
}

impl Harness {
    pub fn new(func: Function) -> Self {
        Harness {
            func,
            index: MemIndex::new(),
            options: Options::default(),
            collect: CollectedInfo::default(),
        }
    }

    pub fn with_index(mut self, index: MemIndex) -> Self {
        self.index = index;
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_collect(mut self, collect: CollectedInfo) -> Self {
        self.collect = collect;
        self
    }

    pub fn entry_state(&self) -> State {
        State::entry(&self.func)
    }

    /// Interpret `block` from the function's entry state.
    pub fn run(&mut self, block: impl Into<BlockId>) -> Result<Outcome> {
        self.interpret(block.into(), None)
    }

    /// Interpret `block` from `state`.
    pub fn run_from(&mut self, block: impl Into<BlockId>, state: State) -> Result<Outcome> {
        self.interpret(block.into(), Some(state))
    }

    fn interpret(&mut self, block: BlockId, state: Option<State>) -> Result<Outcome> {
        let mut interp = Interp::builder()
            .index(&self.index)
            .func(&self.func)
            .block(block)
            .options(self.options.clone())
            .collect(&mut self.collect)
            .maybe_state(state)
            .build()?;
        let mut propagated = Vec::new();
        let flags = stackflow_interp::run(&mut interp, |target, s| {
            propagated.push((target, s.clone()));
        })?;
        Ok(Outcome {
            flags,
            state: interp.state,
            propagated,
        })
    }

    /// Interpret `op` alone from `state`, in the context of the function's
    /// first block.
    pub fn step(&mut self, state: State, op: &Op) -> Result<(EffectFlags, State)> {
        let mut interp = Interp::builder()
            .index(&self.index)
            .func(&self.func)
            .block(BlockId::new(0))
            .options(self.options.clone())
            .collect(&mut self.collect)
            .state(state)
            .build()?;
        let flags = stackflow_interp::step(&mut interp, op)?;
        Ok((flags, interp.state))
    }
}
