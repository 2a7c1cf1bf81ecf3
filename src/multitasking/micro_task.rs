use std::collections::VecDeque;

use bevy::log::warn;

/// A resumable computation advanced one step at a time.
///
/// `alive` turns false exactly when the result becomes available. Resuming a
/// finished task is a no-op.
pub trait MicroTask: Send + Sync {
    type Output;

    fn resume(&mut self);

    fn alive(&self) -> bool;

    /// Takes the result of a finished task; `None` while alive or once taken.
    fn take_result(&mut self) -> Option<Self::Output>;
}

pub type BoxedMicroTask<T> = Box<dyn MicroTask<Output = T>>;

impl<M: MicroTask + ?Sized> MicroTask for Box<M> {
    type Output = M::Output;

    fn resume(&mut self) {
        (**self).resume()
    }

    fn alive(&self) -> bool {
        (**self).alive()
    }

    fn take_result(&mut self) -> Option<Self::Output> {
        (**self).take_result()
    }
}

pub trait MicroTaskExt: MicroTask + Sized + 'static {
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        F: FnOnce(Self::Output) -> U + Send + Sync,
    {
        Map { task: self, f: Some(f) }
    }

    fn flat_map<N, F>(self, f: F) -> FlatMap<Self, N, F>
    where
        N: MicroTask,
        F: FnOnce(Self::Output) -> N + Send + Sync,
    {
        FlatMap {
            state: FlatMapState::First(self, f),
        }
    }

    fn boxed(self) -> BoxedMicroTask<Self::Output> {
        Box::new(self)
    }
}

impl<M: MicroTask + Sized + 'static> MicroTaskExt for M {}

/// Already finished task holding a value
pub struct Constant<T>(Option<T>);

pub fn constant<T: Send + Sync>(value: T) -> Constant<T> {
    Constant(Some(value))
}

impl<T: Send + Sync> MicroTask for Constant<T> {
    type Output = T;

    fn resume(&mut self) {}

    fn alive(&self) -> bool {
        false
    }

    fn take_result(&mut self) -> Option<T> {
        self.0.take()
    }
}

/// Folds one item into the accumulator per step.
pub struct Fold<I, A, F> {
    items: VecDeque<I>,
    acc: Option<A>,
    f: F,
}

pub fn fold<I, A, F>(items: impl IntoIterator<Item = I>, init: A, f: F) -> Fold<I, A, F>
where
    F: FnMut(&mut A, I),
{
    Fold {
        items: items.into_iter().collect(),
        acc: Some(init),
        f,
    }
}

impl<I, A, F> MicroTask for Fold<I, A, F>
where
    I: Send + Sync,
    A: Send + Sync,
    F: FnMut(&mut A, I) + Send + Sync,
{
    type Output = A;

    fn resume(&mut self) {
        if let (Some(item), Some(acc)) = (self.items.pop_front(), self.acc.as_mut()) {
            (self.f)(acc, item);
        }
    }

    fn alive(&self) -> bool {
        !self.items.is_empty()
    }

    fn take_result(&mut self) -> Option<A> {
        if self.alive() {
            None
        } else {
            self.acc.take()
        }
    }
}

pub struct Map<M, F> {
    task: M,
    f: Option<F>,
}

impl<M, U, F> MicroTask for Map<M, F>
where
    M: MicroTask,
    F: FnOnce(M::Output) -> U + Send + Sync,
{
    type Output = U;

    fn resume(&mut self) {
        self.task.resume();
    }

    fn alive(&self) -> bool {
        self.task.alive()
    }

    fn take_result(&mut self) -> Option<U> {
        let value = self.task.take_result()?;
        self.f.take().map(|f| f(value))
    }
}

enum FlatMapState<M, N, F> {
    First(M, F),
    Second(N),
    Done,
}

/// Runs `M`, then the task built from its result.
///
/// Building the second task costs the step in which the first one finishes.
pub struct FlatMap<M, N, F> {
    state: FlatMapState<M, N, F>,
}

impl<M, N, F> MicroTask for FlatMap<M, N, F>
where
    M: MicroTask,
    N: MicroTask,
    F: FnOnce(M::Output) -> N + Send + Sync,
{
    type Output = N::Output;

    fn resume(&mut self) {
        match &mut self.state {
            FlatMapState::First(first, _) => {
                if first.alive() {
                    first.resume();
                }
                if first.alive() {
                    return;
                }
            }
            FlatMapState::Second(second) => {
                second.resume();
                return;
            }
            FlatMapState::Done => return,
        }

        if let FlatMapState::First(mut first, f) = std::mem::replace(&mut self.state, FlatMapState::Done) {
            match first.take_result() {
                Some(value) => self.state = FlatMapState::Second(f(value)),
                None => {
                    warn!("Microtask finished without a result; its continuation is dropped");
                    debug_assert!(false, "finished microtask without a result");
                }
            }
        }
    }

    fn alive(&self) -> bool {
        match &self.state {
            FlatMapState::First(..) => true,
            FlatMapState::Second(second) => second.alive(),
            FlatMapState::Done => false,
        }
    }

    fn take_result(&mut self) -> Option<N::Output> {
        match &mut self.state {
            FlatMapState::Second(second) if !second.alive() => second.take_result(),
            _ => None,
        }
    }
}

/// Defers building a task until the first step.
pub fn lazy<N, F>(f: F) -> impl MicroTask<Output = N::Output>
where
    N: MicroTask + 'static,
    F: FnOnce() -> N + Send + Sync + 'static,
{
    constant(()).flat_map(move |_| f())
}

/// Interleaves children round-robin, one step per resume.
///
/// Results are returned in the order the children were given.
pub struct Join<T> {
    tasks: Vec<BoxedMicroTask<T>>,
    cursor: usize,
}

pub fn join<T>(tasks: Vec<BoxedMicroTask<T>>) -> Join<T> {
    Join { tasks, cursor: 0 }
}

impl<T> MicroTask for Join<T> {
    type Output = Vec<T>;

    fn resume(&mut self) {
        let count = self.tasks.len();
        for offset in 0..count {
            let index = (self.cursor + offset) % count;
            if self.tasks[index].alive() {
                self.tasks[index].resume();
                self.cursor = (index + 1) % count;
                return;
            }
        }
    }

    fn alive(&self) -> bool {
        self.tasks.iter().any(|task| task.alive())
    }

    fn take_result(&mut self) -> Option<Vec<T>> {
        if self.alive() {
            return None;
        }
        self.tasks.iter_mut().map(|task| task.take_result()).collect()
    }
}

/// Two heterogeneous tasks stepped alternately.
pub struct Pair<A: MicroTask, B: MicroTask> {
    first: A,
    second: B,
    first_turn: bool,
}

pub fn pair<A: MicroTask, B: MicroTask>(first: A, second: B) -> Pair<A, B> {
    Pair {
        first,
        second,
        first_turn: true,
    }
}

impl<A: MicroTask, B: MicroTask> MicroTask for Pair<A, B> {
    type Output = (A::Output, B::Output);

    fn resume(&mut self) {
        let first_turn = self.first_turn && self.first.alive() || !self.second.alive();
        if first_turn {
            self.first.resume();
        } else {
            self.second.resume();
        }
        self.first_turn = !first_turn;
    }

    fn alive(&self) -> bool {
        self.first.alive() || self.second.alive()
    }

    fn take_result(&mut self) -> Option<Self::Output> {
        if self.alive() {
            return None;
        }
        Some((self.first.take_result()?, self.second.take_result()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Finishes after one step but has already lost its result
    struct Emptied;

    impl MicroTask for Emptied {
        type Output = u32;

        fn resume(&mut self) {}

        fn alive(&self) -> bool {
            false
        }

        fn take_result(&mut self) -> Option<u32> {
            None
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "finished microtask without a result")]
    fn test_flat_map_flags_first_task_without_result() {
        let mut task = Emptied.flat_map(constant::<u32>);
        task.resume();
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_flat_map_flags_first_task_without_result() {
        let mut task = Emptied.flat_map(constant::<u32>);
        task.resume();
        assert!(!task.alive());
        assert!(task.take_result().is_none());
    }

    fn run_to_completion<M: MicroTask>(task: &mut M) -> usize {
        let mut steps = 0;
        while task.alive() {
            task.resume();
            steps += 1;
        }
        steps
    }

    #[test]
    fn test_fold_takes_one_step_per_item() {
        let mut task = fold(vec![1, 2, 3], 0, |acc: &mut i32, item| *acc += item);
        assert!(task.take_result().is_none());
        assert_eq!(run_to_completion(&mut task), 3);
        assert_eq!(task.take_result(), Some(6));

        task.resume();
        assert!(task.take_result().is_none());
    }

    #[test]
    fn test_constant_is_finished_immediately() {
        let mut task = constant("done");
        assert_eq!(run_to_completion(&mut task), 0);
        assert_eq!(task.take_result(), Some("done"));
    }

    #[test]
    fn test_flat_map_builds_second_task_on_demand() {
        let built = Arc::new(Mutex::new(false));
        let flag = built.clone();
        let mut task = fold(vec![1, 2], 0, |acc: &mut i32, item| *acc += item).flat_map(move |sum| {
            *flag.lock().unwrap() = true;
            fold(0..sum, Vec::new(), |acc: &mut Vec<i32>, item| acc.push(item))
        });

        task.resume();
        assert!(!*built.lock().unwrap());
        task.resume();
        assert!(*built.lock().unwrap());

        // 2 steps for the first fold, 3 for the second
        assert_eq!(run_to_completion(&mut task), 3);
        assert_eq!(task.take_result(), Some(vec![0, 1, 2]));
    }

    #[test]
    fn test_lazy_runs_closure_on_first_step() {
        let mut task = lazy(|| constant(5)).map(|value| value * 2);
        assert!(task.alive());
        assert_eq!(run_to_completion(&mut task), 1);
        assert_eq!(task.take_result(), Some(10));
    }

    #[test]
    fn test_join_interleaves_deterministically() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tasks: Vec<BoxedMicroTask<usize>> = [2usize, 1, 3]
            .into_iter()
            .enumerate()
            .map(|(id, steps)| {
                let log = log.clone();
                fold(0..steps, 0, move |acc: &mut usize, _| {
                    log.lock().unwrap().push(id);
                    *acc += 1;
                })
                .boxed()
            })
            .collect();

        let mut task = join(tasks);
        assert_eq!(run_to_completion(&mut task), 6);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 0, 2, 2]);
        assert_eq!(task.take_result(), Some(vec![2, 1, 3]));
    }

    #[test]
    fn test_pair_finishes_when_both_do() {
        let mut task = pair(
            fold(0..3, 0, |acc: &mut i32, item| *acc += item),
            fold(vec!["a"], String::new(), |acc: &mut String, item| acc.push_str(item)),
        );
        assert_eq!(run_to_completion(&mut task), 4);
        assert_eq!(task.take_result(), Some((3, "a".to_string())));
    }
}
