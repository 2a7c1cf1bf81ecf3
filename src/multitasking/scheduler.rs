use std::time::Duration;

use bevy::log::debug;

use super::micro_task::{BoxedMicroTask, MicroTask};
use crate::ecs::{ComponentManager, EcsContext, EntityId, System};

/// Hosts an unfinished microtask on an entity.
///
/// Destroying the host entity drops the task, which cancels it.
pub struct MicroThreadComponent {
    pub task: BoxedMicroTask<()>,
    /// Max steps per scheduler pass
    pub quantum: u32,
}

impl MicroThreadComponent {
    pub fn new(task: BoxedMicroTask<()>) -> Self {
        Self { task, quantum: 1 }
    }

    pub fn with_quantum(mut self, quantum: u32) -> Self {
        self.quantum = quantum.max(1);
        self
    }
}

/// Advances hosted microtasks within a per-frame time budget.
///
/// The budget is checked before each entity's quantum, except the first one
/// of the frame, so every frame advances at least one task. A quantum that has
/// started always runs to its end, so one frame can overrun the budget by at
/// most one quantum of one task.
pub struct SchedulerSystem {
    frame_time_limit: Duration,
    completed: Vec<EntityId>,
    pending: usize,
}

impl SchedulerSystem {
    pub fn new(frame_time_limit: Duration) -> Self {
        Self {
            frame_time_limit,
            completed: Vec::new(),
            pending: 0,
        }
    }

    /// Entities whose task finished during the last pass
    pub fn completed(&self) -> &[EntityId] {
        &self.completed
    }

    /// Tasks still running after the last pass
    pub fn pending(&self) -> usize {
        self.pending
    }
}

impl<C: EcsContext> System<C> for SchedulerSystem {
    fn name(&self) -> &str {
        "SchedulerSystem"
    }

    fn update(&mut self, manager: &mut ComponentManager, context: &mut C, _dt: Duration) {
        self.completed.clear();
        let entities = manager.entities_with::<MicroThreadComponent>();

        let mut visited = 0;
        for &entity in &entities {
            if visited > 0 && context.frame_elapsed() >= self.frame_time_limit {
                break;
            }
            visited += 1;

            let Some(thread) = manager.get_component_mut::<MicroThreadComponent>(entity) else {
                continue;
            };
            for _ in 0..thread.quantum {
                if !thread.task.alive() {
                    break;
                }
                thread.task.resume();
            }
            if !thread.task.alive() {
                // Taking the result runs any continuations mapped onto the task
                thread.task.take_result();
                self.completed.push(entity);
            }
        }

        for &entity in &self.completed {
            manager.take_component::<MicroThreadComponent>(entity);
        }
        self.pending = manager.count::<MicroThreadComponent>();

        if visited < entities.len() {
            debug!(
                "Frame budget exhausted after {} of {} microtasks",
                visited,
                entities.len()
            );
        }
    }
}
