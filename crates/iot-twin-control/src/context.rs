use crate::action::Action;
use crate::error::ControlError;
use iot_twin_abstract::AppId;
use std::sync::atomic::{AtomicU32, Ordering};

/// Control-loop iterations a single process performs.
pub const MAX_ITERATIONS_PER_PROCESS: u32 = 1;

static PROCESS_BUDGET: IterationBudget = IterationBudget::new(MAX_ITERATIONS_PER_PROCESS);

/// Counts iterations claimed against a fixed limit. The process-wide budget
/// is [`IterationBudget::process`]; separate budgets stand in for separate
/// processes.
#[derive(Debug)]
pub struct IterationBudget {
    limit: u32,
    claimed: AtomicU32,
}

impl IterationBudget {
    pub const fn new(limit: u32) -> Self {
        Self {
            limit,
            claimed: AtomicU32::new(0),
        }
    }

    pub fn process() -> &'static IterationBudget {
        &PROCESS_BUDGET
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn claimed(&self) -> u32 {
        self.claimed.load(Ordering::SeqCst).min(self.limit)
    }

    /// Take the next iteration number, or fail once the limit is used up.
    pub fn claim(&self) -> Result<u32, ControlError> {
        self.claimed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .map(|previous| previous + 1)
            .map_err(|_| ControlError::IterationLimit { limit: self.limit })
    }
}

/// Per-process control-loop state: created at start, dropped at exit.
#[derive(Debug, Clone)]
pub struct ControlLoopContext {
    controlled: AppId,
    action: Action,
    iteration: u32,
    max_iterations: u32,
}

impl ControlLoopContext {
    pub fn new(controlled: AppId, action: Action) -> Self {
        Self {
            controlled,
            action,
            iteration: 0,
            max_iterations: MAX_ITERATIONS_PER_PROCESS,
        }
    }

    pub fn controlled(&self) -> AppId {
        self.controlled
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Claim the next iteration from `budget`. Fails once the budget is
    /// used up, however many contexts were created against it.
    pub fn begin_iteration(&mut self, budget: &IterationBudget) -> Result<u32, ControlError> {
        self.max_iterations = budget.limit();
        self.iteration = budget.claim()?;
        Ok(self.iteration)
    }
}
