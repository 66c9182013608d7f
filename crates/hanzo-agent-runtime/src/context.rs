//! Runtime context for agent execution

use crate::agent::Agent;
use crate::types::{RunItem, Usage};
use std::any::Any;
use std::sync::Arc;

/// Shared handle to the user-supplied context object
pub type ContextData = Arc<dyn Any + Send + Sync>;

/// Mutable per-run state.
///
/// Holds the user-provided context, the working history, the active agent,
/// the turn counter and usage statistics. One `RunContext` belongs to exactly
/// one run; a nested agent-as-tool run gets its own, sharing at most the user
/// context object.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// User-provided context data
    context: Option<ContextData>,

    /// Conversation as the model sees it
    history: Vec<RunItem>,

    /// Agent currently in control
    current_agent: Arc<Agent>,

    /// Completed model round-trips
    turn: usize,

    /// Usage statistics
    usage: Usage,
}

impl RunContext {
    /// Create a new run context for `agent` without user data
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            context: None,
            history: Vec::new(),
            current_agent: agent,
            turn: 0,
            usage: Usage::default(),
        }
    }

    /// Create a run context with user data
    pub fn with_context<T: Any + Send + Sync + 'static>(agent: Arc<Agent>, data: T) -> Self {
        Self::new(agent).with_shared_context(Some(Arc::new(data)))
    }

    /// Attach an already shared user context handle
    pub fn with_shared_context(mut self, context: Option<ContextData>) -> Self {
        self.context = context;
        self
    }

    /// Seed the history
    pub fn with_history(mut self, history: Vec<RunItem>) -> Self {
        self.history = history;
        self
    }

    /// Get the user context data
    pub fn context<T: Any + Send + Sync + 'static>(&self) -> Option<&T> {
        self.context.as_ref().and_then(|c| c.downcast_ref::<T>())
    }

    /// The raw shared handle, for passing the same object to a nested run
    pub fn context_handle(&self) -> Option<ContextData> {
        self.context.clone()
    }

    /// Current conversation history
    pub fn history(&self) -> &[RunItem] {
        &self.history
    }

    /// The agent currently in control
    pub fn current_agent(&self) -> &Arc<Agent> {
        &self.current_agent
    }

    /// Number of model round-trips started so far
    pub fn turn(&self) -> usize {
        self.turn
    }

    /// Get usage statistics
    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Add usage from a model response
    pub fn add_usage(&mut self, usage: &Usage) {
        self.usage.add(usage);
    }

    pub(crate) fn push(&mut self, item: RunItem) {
        self.history.push(item);
    }

    pub(crate) fn extend(&mut self, items: impl IntoIterator<Item = RunItem>) {
        self.history.extend(items);
    }

    pub(crate) fn replace_history(&mut self, history: Vec<RunItem>) {
        self.history = history;
    }

    pub(crate) fn take_history(&mut self) -> Vec<RunItem> {
        std::mem::take(&mut self.history)
    }

    pub(crate) fn advance_turn(&mut self) -> usize {
        self.turn += 1;
        self.turn
    }

    pub(crate) fn set_agent(&mut self, agent: Arc<Agent>) {
        self.current_agent = agent;
    }
}
