use rstest::rstest;
use lfdeque_core::common_tests::deque_core_tests::*;
use lfdeque_core::{CoalescingDeque, ConcurrentDeque, DeferredGuard, LockFreeDeque};

// Trait for type-level parametrization
trait TestDeque {
    type DequeType: ConcurrentDeque<i32> + Default + Send + Sync + 'static;
}

// Marker types for each configuration
struct UsePlain;
struct UseCoalescing;

impl TestDeque for UsePlain {
    type DequeType = LockFreeDeque<i32, DeferredGuard>;
}

impl TestDeque for UseCoalescing {
    type DequeType = CoalescingDeque<i32, DeferredGuard>;
}

#[rstest]
#[case::plain(UsePlain)]
#[case::coalescing(UseCoalescing)]
fn basic_operations<T: TestDeque>(#[case] _type: T) {
    test_basic_operations(&T::DequeType::default());
}

#[rstest]
#[case::plain(UsePlain)]
#[case::coalescing(UseCoalescing)]
fn mixed_ends<T: TestDeque>(#[case] _type: T) {
    test_mixed_ends(&T::DequeType::default());
}

#[rstest]
#[case::plain(UsePlain)]
#[case::coalescing(UseCoalescing)]
fn contains_one<T: TestDeque>(#[case] _type: T) {
    test_contains_one(&T::DequeType::default());
}

#[rstest]
#[case::plain(UsePlain)]
#[case::coalescing(UseCoalescing)]
fn conditional_inserts<T: TestDeque>(#[case] _type: T) {
    test_conditional_inserts(&T::DequeType::default());
}

#[rstest]
#[case::plain(UsePlain)]
#[case::coalescing(UseCoalescing)]
fn emptied_flag<T: TestDeque>(#[case] _type: T) {
    test_emptied_flag(&T::DequeType::default());
}

#[rstest]
#[case::plain(UsePlain)]
#[case::coalescing(UseCoalescing)]
fn clear<T: TestDeque>(#[case] _type: T) {
    test_clear(&T::DequeType::default());
}

#[rstest]
#[case::plain(UsePlain)]
#[case::coalescing(UseCoalescing)]
fn quiescent_stability<T: TestDeque>(#[case] _type: T) {
    test_quiescent_stability::<T::DequeType>();
}

#[test]
fn coalesced_run_equivalence() {
    test_coalesced_run_equivalence::<DeferredGuard>();
}

#[test]
fn coalesced_contains_one() {
    test_coalesced_contains_one::<DeferredGuard>();
}

#[test]
fn coalesced_exclusive_runs() {
    test_coalesced_exclusive_runs::<DeferredGuard>();
}

#[test]
fn exclusive_operations() {
    test_exclusive_operations::<DeferredGuard>();
}

#[test]
fn clear_drops_payloads() {
    test_clear_drops_payloads::<DeferredGuard>();
}

#[test]
fn try_push_reports_success() {
    let deque = LockFreeDeque::<u64, DeferredGuard>::new();
    assert_eq!(deque.try_push_back(1), Ok(true));
    assert_eq!(deque.try_push_front(0), Ok(false));
    assert_eq!(deque.pop_front().map(|p| p.value), Some(0));
}

#[test]
fn push_with_builds_in_place() {
    let deque = LockFreeDeque::<Vec<u8>, DeferredGuard>::new();
    assert!(deque.push_back_with(|| vec![1, 2, 3]));
    assert!(!deque.push_front_with(Vec::new));
    assert_eq!(unsafe { deque.peek_back() }, Some(vec![1, 2, 3]));
    assert_eq!(unsafe { deque.peek_front() }, Some(vec![]));
}

#[test]
fn debug_shows_state() {
    let deque: LockFreeDeque<i32, DeferredGuard> = (0..3).collect();
    let rendered = format!("{:?}", deque);
    assert!(rendered.contains("is_empty: false"));
    assert!(rendered.contains("is_stable: true"));
}
