//! Containers over every allocator strategy

use ambit_memory::{Allocator, ArenaConfig, Buf, Map, MemoryUsage, PoolConfig, Ring, Str};
use std::mem::ManuallyDrop;

use rstest::rstest;

fn tracked(inner: Allocator) -> Allocator {
    Allocator::leak_tracking(inner)
}

#[rstest]
#[case::general(Allocator::general())]
#[case::stack(Allocator::stack(1 << 20).unwrap())]
#[case::arena(Allocator::arena(ArenaConfig::default()).unwrap())]
fn test_containers_release_everything_on_drop(#[case] inner: Allocator) {
    let allocator = tracked(inner);
    {
        let mut numbers = Buf::with_allocator(allocator.clone());
        for i in 0..500u32 {
            numbers.push(i);
        }
        assert_eq!(numbers.iter().sum::<u32>(), (0..500).sum::<u32>());
    }
    {
        let mut queue = Ring::with_allocator(allocator.clone());
        for i in 0..100 {
            queue.push_back(i);
            if i % 3 == 0 {
                queue.pop_front();
            }
        }
        assert_eq!(queue.len(), 66);
    }
    {
        let mut text = Str::with_allocator(allocator.clone());
        for word in ["alpha", "beta", "gamma"] {
            text.push_str(word);
            text.push(' ');
        }
        assert_eq!(text.trim_end(), "alpha beta gamma");
    }

    let tracker = allocator.as_leak_tracking().unwrap();
    assert!(tracker.report().is_clean(), "{}", tracker.report());
    assert_eq!(tracker.invalid_releases(), 0);
}

#[test]
fn test_map_on_general_with_str_keys() {
    let allocator = tracked(Allocator::general());
    {
        let mut words: Map<Str, usize> = Map::with_allocator(allocator.clone());
        for word in "the quick brown fox jumps over the lazy dog".split(' ') {
            if let Some(count) = words.get_mut(word) {
                *count += 1;
            } else {
                words.insert(Str::from_str_in(word, allocator.clone()), 1);
            }
        }
        assert_eq!(words.get("the"), Some(&2));
        assert_eq!(words.get("fox"), Some(&1));
        assert_eq!(words.len(), 8);
        assert_eq!(words.remove("the"), Some(2));
        assert!(!words.contains_key("the"));
    }
    let tracker = allocator.as_leak_tracking().unwrap();
    assert!(tracker.report().is_clean());
}

#[test]
fn test_buf_of_fixed_elements_on_pool() {
    // every growth step fits a single 256-byte slot
    let pool = Allocator::pool(PoolConfig::new(256, 8)).unwrap();
    let mut small = Buf::with_capacity_in(8, pool.clone());
    small.extend_from_slice(&[1u64; 8]);
    assert_eq!(small.capacity(), 32);
    small.extend_from_slice(&[2u64; 24]);
    assert_eq!(small.len(), 32);
    assert_eq!(pool.used_memory(), 256);
    drop(small);
    assert_eq!(pool.used_memory(), 0);
}

#[test]
fn test_buf_on_stack_grows_in_place() {
    let stack = Allocator::stack(1 << 16).unwrap();
    let mut bytes = Buf::with_allocator(stack.clone());
    bytes.push(0u8);
    let start = bytes.as_ptr();
    for i in 0..4000u32 {
        bytes.push(i as u8);
    }
    assert_eq!(bytes.as_ptr(), start);
    assert!(stack.used_memory() >= 4001);
}

#[test]
fn test_clone_shares_allocator() {
    let arena = Allocator::arena(ArenaConfig::compact()).unwrap();
    let mut original = Buf::with_allocator(arena.clone());
    original.extend_from_slice(&[1, 2, 3]);
    let copy = original.clone();
    assert_eq!(copy, [1, 2, 3]);
    assert!(Allocator::ptr_eq(copy.allocator(), &arena));
}

#[test]
fn test_map_on_stack_grows_within_its_first_reservation() {
    let stack = Allocator::stack(1 << 16).unwrap();
    let mut map = Map::with_allocator(stack);
    map.reserve(64);
    for i in 0..64u32 {
        map.insert(i, i);
    }
    assert_eq!(map.len(), 64);
    assert!((0..64).all(|i| map.get(&i) == Some(&i)));
}

#[test]
#[should_panic(expected = "only the top block can grow")]
fn test_map_on_stack_panics_when_buried_entries_grow() {
    let stack = Allocator::stack(1 << 16).unwrap();
    // unwinding must not release the buried entries
    let mut map = ManuallyDrop::new(Map::with_allocator(stack));
    // entries go first, the index lands on top of them
    for i in 0..9u32 {
        map.insert(i, i);
    }
}
