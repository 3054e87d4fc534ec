use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use super::operation::{GattTarget, Operation, OperationId, OperationKind};

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1);
const DEFAULT_CEILING: Duration = Duration::from_millis(2000);

/// Exponential backoff for submissions the hardware refuses as busy.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            ceiling: DEFAULT_CEILING,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; a zero initial delay is raised to one millisecond.
    #[must_use]
    pub fn new(initial_delay: Duration, ceiling: Duration) -> Self {
        Self {
            initial_delay: initial_delay.max(DEFAULT_INITIAL_DELAY),
            ceiling,
        }
    }

    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    #[must_use]
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Returns the delay before the next attempt, or `None` once doubling
    /// would pass the ceiling and the submission must be abandoned.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// let policy = blesched::RetryPolicy::default();
    /// assert_eq!(Some(Duration::from_millis(1)), policy.next_delay(None));
    /// assert_eq!(
    ///     Some(Duration::from_millis(1024)),
    ///     policy.next_delay(Some(Duration::from_millis(512)))
    /// );
    /// assert_eq!(None, policy.next_delay(Some(Duration::from_millis(1024))));
    /// ```
    #[must_use]
    pub fn next_delay(&self, previous: Option<Duration>) -> Option<Duration> {
        let next = match previous {
            None => self.initial_delay,
            Some(delay) => delay.saturating_mul(2),
        };
        (next <= self.ceiling).then_some(next)
    }

    /// Returns every delay the policy allows, in order.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(self.next_delay(None), |delay| self.next_delay(Some(*delay)))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum HeadState {
    Waiting,
    InFlight,
    AwaitingRetry,
}

/// FIFO of operations where only the head may be in flight.
#[derive(Debug)]
pub struct DispatchQueue {
    pending: VecDeque<Operation>,
    head_state: HeadState,
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            head_state: HeadState::Waiting,
        }
    }
}

impl DispatchQueue {
    /// Appends an operation; returns `true` when it became the head.
    pub(crate) fn push(&mut self, operation: Operation) -> bool {
        self.pending.push_back(operation);
        self.pending.len() == 1
    }

    #[must_use]
    pub fn head(&self) -> Option<&Operation> {
        self.pending.front()
    }

    pub(crate) fn head_mut(&mut self) -> Option<&mut Operation> {
        self.pending.front_mut()
    }

    /// Returns the head when it has been submitted and awaits a callback.
    #[must_use]
    pub fn in_flight(&self) -> Option<&Operation> {
        (self.head_state == HeadState::InFlight)
            .then(|| self.pending.front())
            .flatten()
    }

    /// Returns whether the head is an in-flight operation of `kind` on
    /// `characteristic`.
    #[must_use]
    pub fn in_flight_matches(&self, kind: OperationKind, characteristic: &Uuid) -> bool {
        self.in_flight().is_some_and(|head| {
            head.kind() == kind && head.target().characteristic() == *characteristic
        })
    }

    #[must_use]
    pub fn contains(&self, id: OperationId) -> bool {
        self.pending.iter().any(|operation| operation.id() == id)
    }

    pub(crate) fn is_awaiting_retry(&self, id: OperationId) -> bool {
        self.head_state == HeadState::AwaitingRetry
            && self.pending.front().is_some_and(|head| head.id() == id)
    }

    pub(crate) fn mark_in_flight(&mut self) {
        self.head_state = HeadState::InFlight;
    }

    pub(crate) fn mark_awaiting_retry(&mut self) {
        self.head_state = HeadState::AwaitingRetry;
    }

    /// Removes the head if it is `id`; any other id leaves the queue untouched.
    pub(crate) fn dequeue_if_head(&mut self, id: OperationId) -> Option<Operation> {
        if self.pending.front().is_none_or(|head| head.id() != id) {
            return None;
        }
        self.head_state = HeadState::Waiting;
        self.pending.pop_front()
    }

    pub(crate) fn clear(&mut self) -> Vec<Operation> {
        self.head_state = HeadState::Waiting;
        self.pending.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// What a deferred retry re-submits when it fires.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryTarget {
    /// The queue head with this id.
    Head(OperationId),
    /// Disabling notifications, which runs outside the queue.
    Unsubscribe(GattTarget),
}

/// A retry that becomes due at a deadline.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RetryTimer {
    due: Instant,
    delay: Duration,
    target: RetryTarget,
}

impl RetryTimer {
    #[must_use]
    pub fn due(&self) -> Instant {
        self.due
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    #[must_use]
    pub fn target(&self) -> RetryTarget {
        self.target
    }
}

/// Deferred retries, fired by the owner when their deadline passes.
#[derive(Debug, Default)]
pub struct RetryTimers {
    timers: Vec<RetryTimer>,
}

impl RetryTimers {
    pub(crate) fn schedule(&mut self, now: Instant, delay: Duration, target: RetryTarget) {
        self.timers.retain(|timer| timer.target != target);
        self.timers.push(RetryTimer {
            due: now + delay,
            delay,
            target,
        });
    }

    /// Returns the earliest deadline, if any retry is pending.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(RetryTimer::due).min()
    }

    /// Removes and returns every timer due at `now`, earliest first.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<RetryTimer> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.timers.drain(..).partition(|timer| timer.due <= now);
        self.timers = pending;
        due.sort_by_key(RetryTimer::due);
        due
    }

    pub(crate) fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &RetryTimer> {
        self.timers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::codec::ElementType;

    fn read(id: u64) -> Operation {
        let target = GattTarget::new(Uuid::from_u128(1), Uuid::from_u128(2));
        Operation::read(OperationId::new(id), target, ElementType::UInt8)
    }

    #[test]
    fn default_schedule_doubles_from_one_millisecond_to_the_ceiling() {
        let delays: Vec<u64> = RetryPolicy::default()
            .schedule()
            .map(|delay| u64::try_from(delay.as_millis()).expect("delay should fit in u64"))
            .collect();

        assert_eq!(vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024], delays);
    }

    #[rstest]
    #[case::zero_initial(Duration::ZERO, Duration::from_millis(10), 4)]
    #[case::ceiling_below_initial(Duration::from_millis(5), Duration::from_millis(1), 0)]
    #[case::exact_ceiling(Duration::from_millis(5), Duration::from_millis(20), 3)]
    fn custom_policies_bound_the_attempt_count(
        #[case] initial: Duration,
        #[case] ceiling: Duration,
        #[case] expected: usize,
    ) {
        assert_eq!(expected, RetryPolicy::new(initial, ceiling).schedule().count());
    }

    #[test]
    fn only_the_first_push_becomes_head() {
        let mut queue = DispatchQueue::default();

        assert!(queue.push(read(1)));
        assert!(!queue.push(read(2)));
        assert_eq!(Some(OperationId::new(1)), queue.head().map(Operation::id));
    }

    #[test]
    fn dequeue_ignores_ids_that_are_not_the_head() {
        let mut queue = DispatchQueue::default();
        queue.push(read(1));
        queue.push(read(2));
        queue.mark_in_flight();

        assert_eq!(None, queue.dequeue_if_head(OperationId::new(2)));
        assert_eq!(2, queue.len());
        assert!(queue.in_flight().is_some());

        let dequeued = queue.dequeue_if_head(OperationId::new(1));
        assert_eq!(Some(OperationId::new(1)), dequeued.map(|op| op.id()));
        assert_eq!(None, queue.in_flight());
    }

    #[test]
    fn in_flight_matching_requires_submission() {
        let mut queue = DispatchQueue::default();
        queue.push(read(1));
        let characteristic = Uuid::from_u128(2);

        assert!(!queue.in_flight_matches(OperationKind::Read, &characteristic));
        queue.mark_awaiting_retry();
        assert!(queue.is_awaiting_retry(OperationId::new(1)));
        assert!(!queue.in_flight_matches(OperationKind::Read, &characteristic));
        queue.mark_in_flight();
        assert!(queue.in_flight_matches(OperationKind::Read, &characteristic));
        assert!(!queue.in_flight_matches(OperationKind::Write, &characteristic));
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let now = Instant::now();
        let mut timers = RetryTimers::default();
        let unsubscribe =
            RetryTarget::Unsubscribe(GattTarget::new(Uuid::from_u128(1), Uuid::from_u128(3)));
        timers.schedule(now, Duration::from_millis(8), unsubscribe);
        timers.schedule(now, Duration::from_millis(2), RetryTarget::Head(OperationId::new(1)));

        assert_eq!(Some(now + Duration::from_millis(2)), timers.next_deadline());
        assert!(timers.take_due(now + Duration::from_millis(1)).is_empty());

        let due = timers.take_due(now + Duration::from_millis(10));
        let targets: Vec<_> = due.iter().map(RetryTimer::target).collect();
        assert_eq!(vec![RetryTarget::Head(OperationId::new(1)), unsubscribe], targets);
        assert!(timers.is_empty());
    }

    #[test]
    fn rescheduling_a_target_replaces_its_timer() {
        let now = Instant::now();
        let mut timers = RetryTimers::default();
        let head = RetryTarget::Head(OperationId::new(1));
        timers.schedule(now, Duration::from_millis(1), head);
        timers.schedule(now, Duration::from_millis(2), head);

        assert_eq!(1, timers.len());
        assert_eq!(Some(now + Duration::from_millis(2)), timers.next_deadline());
    }
}
