use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::ecs::{ComponentManager, EcsContext, EntityId, System};

pub type LaterCommand = Box<dyn FnOnce(&mut ComponentManager, EntityId) + Send>;

/// Sending half of the run-later channel.
///
/// Microtasks never touch the store; they queue commands here and the
/// [`RunLaterSystem`] applies them on the loop thread.
#[derive(Clone)]
pub struct LaterQueue {
    sender: Sender<(EntityId, LaterCommand)>,
}

impl LaterQueue {
    pub fn run_later<F>(&self, entity: EntityId, command: F)
    where
        F: FnOnce(&mut ComponentManager, EntityId) + Send + 'static,
    {
        // The receiver lives as long as the engine; a failed send means it is shutting down.
        let _ = self.sender.send((entity, Box::new(command)));
    }
}

pub struct RunLaterSystem {
    receiver: Receiver<(EntityId, LaterCommand)>,
    applied: usize,
    skipped: usize,
}

pub fn run_later_channel() -> (LaterQueue, RunLaterSystem) {
    let (sender, receiver) = unbounded();
    (
        LaterQueue { sender },
        RunLaterSystem {
            receiver,
            applied: 0,
            skipped: 0,
        },
    )
}

impl RunLaterSystem {
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Commands dropped because their target entity was already gone
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<C: EcsContext> System<C> for RunLaterSystem {
    fn name(&self) -> &str {
        "RunLaterSystem"
    }

    fn update(&mut self, manager: &mut ComponentManager, _context: &mut C, _dt: Duration) {
        for (entity, command) in self.receiver.try_iter() {
            if manager.is_alive(entity) {
                command(manager, entity);
                self.applied += 1;
            } else {
                self.skipped += 1;
            }
        }
    }
}
