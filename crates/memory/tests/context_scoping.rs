//! Integration tests for the per-thread allocator context

use ambit_memory::{
    Allocator, AllocatorKind, ArenaConfig, Buf, Map, MemoryUsage, RawAllocator, Ring, Str, context,
};

fn arena() -> Allocator {
    Allocator::arena(ArenaConfig::compact()).unwrap()
}

#[test]
fn test_seed_is_general_and_survives() {
    assert_eq!(context::depth(), 1);
    assert_eq!(context::current().kind(), AllocatorKind::General);
    assert!(Allocator::ptr_eq(&context::current(), &context::current()));
}

#[test]
fn test_containers_keep_allocator_after_pop() {
    let outer = arena();
    let inner = arena();

    context::push(outer.clone());
    let mut numbers: Buf<u32> = Buf::new();
    context::push(inner.clone());
    let mut names: Map<u32, Str> = Map::new();
    let mut queue: Ring<u8> = Ring::new();
    assert!(Allocator::ptr_eq(&context::pop(), &inner));
    assert!(Allocator::ptr_eq(&context::pop(), &outer));

    // growth after the pops still goes to the captured allocators
    numbers.extend_from_slice(&[7; 64]);
    names.insert(1, Str::from_str_in("one", inner.clone()));
    queue.extend(0..32);

    assert!(Allocator::ptr_eq(numbers.allocator(), &outer));
    assert!(Allocator::ptr_eq(names.allocator(), &inner));
    assert!(Allocator::ptr_eq(queue.allocator(), &inner));
    assert!(outer.used_memory() >= 64 * 4);
    assert!(inner.used_memory() >= 32);
    assert_eq!(context::current().kind(), AllocatorKind::General);
}

#[test]
fn test_nested_with_allocator() {
    let a = arena();
    let b = arena();
    let depth = context::depth();

    context::with_allocator(a.clone(), || {
        assert!(Allocator::ptr_eq(&context::current(), &a));
        context::with_allocator(b.clone(), || {
            assert!(Allocator::ptr_eq(&context::current(), &b));
            assert_eq!(context::depth(), depth + 2);
        });
        assert!(Allocator::ptr_eq(&context::current(), &a));
    });
    assert_eq!(context::depth(), depth);
}

#[test]
fn test_allocate_current_uses_top_of_stack() {
    let a = arena();
    let _guard = context::scope(a.clone());
    let block = context::allocate_current(48, 16);
    assert!(!block.is_null());
    assert_eq!(a.used_memory(), 48);
    unsafe { context::release_current(block) };
}

#[test]
#[should_panic(expected = "closed out of order")]
fn test_guards_dropped_out_of_order_panic() {
    let first = context::scope(arena());
    let _second = context::scope(arena());
    drop(first);
}

#[test]
#[should_panic(expected = "cannot pop the seed allocator")]
fn test_popping_the_seed_panics() {
    context::pop();
}

#[test]
fn test_each_thread_has_its_own_stack() {
    let _guard = context::scope(arena());
    assert_eq!(context::depth(), 2);

    let (depth, kind) = std::thread::spawn(|| (context::depth(), context::current().kind()))
        .join()
        .unwrap();
    assert_eq!(depth, 1);
    assert_eq!(kind, AllocatorKind::General);
}

#[test]
fn test_tmp_is_a_reusable_scratch_arena() {
    let tmp = context::tmp();
    assert_eq!(tmp.kind(), AllocatorKind::Arena);
    assert!(Allocator::ptr_eq(&tmp, &context::tmp()));

    {
        let mut scratch = Str::with_allocator(tmp.clone());
        scratch.push_str("short lived");
    }
    assert!(tmp.used_memory() > 0);
    unsafe { tmp.release_all() };
    assert_eq!(tmp.used_memory(), 0);
}
