//! Recipe Runner: the per-machine crafting state machine.
//!
//! States are `Idle` and `Running`. Each tick the owning machine evaluates
//! its runnable condition once and hands the answer to [`RecipeRunner::step`],
//! which advances the state machine and reports what the machine must apply
//! (deduct inputs, deposit outputs). Keeping the node mutations out of the
//! runner lets the machine hold the only mutable borrow of its nodes.
//!
//! # Episodes
//!
//! - `Idle -> Running` when a recipe is selected and the machine can run.
//!   Inputs are deducted on this tick and count as tick 1 of progress.
//! - While `Running`, the condition is re-checked every tick. If it lapses,
//!   progress resets to zero, the state returns to `Idle`, and inputs that
//!   were already deducted are forfeit.
//! - When progress reaches the recipe duration the outputs are produced and
//!   the runner returns to `Idle`; the next episode starts on a later tick.

use crate::catalog::{Catalog, OutputKind, RecipeDef};
use crate::fixed::{Fixed64, Ticks, ratio};
use crate::id::RecipeId;
use crate::machine::Machine;
use crate::node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunnerState {
    #[default]
    Idle,
    Running,
}

/// What a single call to [`RecipeRunner::step`] decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunnerStep {
    /// Inputs must be deducted now.
    pub started: bool,
    /// Outputs must be produced now.
    pub completed: bool,
    /// A running episode was abandoned this tick.
    pub interrupted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRunner {
    capabilities: BTreeSet<String>,
    recipe: Option<RecipeId>,
    forced: bool,
    state: RunnerState,
    progress: Ticks,
}

impl RecipeRunner {
    pub fn new(capabilities: BTreeSet<String>, forced_recipe: Option<RecipeId>) -> Self {
        Self {
            capabilities,
            recipe: forced_recipe,
            forced: forced_recipe.is_some(),
            state: RunnerState::Idle,
            progress: 0,
        }
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    pub fn recipe(&self) -> Option<RecipeId> {
        self.recipe
    }

    /// Whether the recipe was fixed by the archetype.
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunnerState::Running
    }

    /// Ticks completed in the current episode.
    pub fn progress(&self) -> Ticks {
        self.progress
    }

    /// Fraction of the current episode completed, in `[0, 1]`.
    pub fn progress_pct(&self, catalog: &Catalog) -> Fixed64 {
        self.recipe
            .and_then(|r| catalog.recipe(r))
            .map(|r| ratio(self.progress, r.duration))
            .unwrap_or(Fixed64::ZERO)
    }

    /// Replace the selected recipe, abandoning any running episode.
    /// Compatibility is checked by the caller.
    pub(crate) fn select(&mut self, recipe: Option<RecipeId>) {
        self.recipe = recipe;
        self.reset();
    }

    fn reset(&mut self) {
        self.state = RunnerState::Idle;
        self.progress = 0;
    }

    /// Runnable condition contributed by the runner.
    ///
    /// While idle this requires the summed inputs. Once running the inputs
    /// are already committed, so only the continuation requirements (enabled
    /// machine, room for the outputs) are checked.
    pub fn evaluate_condition(&self, machine: &Machine, catalog: &Catalog) -> bool {
        let Some(recipe) = self.recipe.and_then(|r| catalog.recipe(r)) else {
            return false;
        };
        if !machine.enabled {
            return false;
        }
        if self.state == RunnerState::Idle && !inputs_available(machine, recipe) {
            return false;
        }
        match recipe.output_kind {
            OutputKind::Item => node::output_room_for(&machine.nodes, &recipe.output_pairs()),
            OutputKind::Energy => machine
                .producer()
                .is_some_and(|p| p.room() >= recipe.energy_output()),
        }
    }

    /// Advance the state machine by one tick. `runnable` is the machine's
    /// full `can_run()` result evaluated before this call.
    pub fn step(&mut self, runnable: bool, duration: Ticks) -> RunnerStep {
        let mut step = RunnerStep::default();
        if self.recipe.is_none() {
            self.reset();
            return step;
        }

        match self.state {
            RunnerState::Idle => {
                if !runnable {
                    self.progress = 0;
                    return step;
                }
                self.state = RunnerState::Running;
                self.progress = 0;
                step.started = true;
            }
            RunnerState::Running => {
                if !runnable {
                    self.reset();
                    step.interrupted = true;
                    return step;
                }
            }
        }

        self.progress += 1;
        if self.progress >= duration {
            self.reset();
            step.completed = true;
        }
        step
    }
}

fn inputs_available(machine: &Machine, recipe: &RecipeDef) -> bool {
    recipe
        .inputs
        .iter()
        .all(|entry| node::available(&machine.nodes, entry.item) >= entry.quantity)
}
