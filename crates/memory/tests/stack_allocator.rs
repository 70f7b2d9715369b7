//! Integration tests for Stack allocator

use ambit_memory::allocator::{StackAllocator, StackConfig, StackFrame};
use ambit_memory::{Allocator, Block, MemoryUsage, RawAllocator};

fn stack(capacity: usize) -> StackAllocator {
    StackAllocator::with_config(capacity, StackConfig::debug())
        .expect("Failed to create stack allocator")
}

#[test]
fn test_stack_allocator_lifo() {
    let allocator = stack(4096);

    let a = allocator.allocate(64, 8);
    let b = allocator.allocate(64, 16);
    let c = allocator.allocate(64, 64);

    unsafe {
        a.as_mut_slice().fill(0xAA);
        b.as_mut_slice().fill(0xBB);
        c.as_mut_slice().fill(0xCC);
        assert!(a.as_slice().iter().all(|&x| x == 0xAA));
        assert!(b.as_slice().iter().all(|&x| x == 0xBB));

        // Deallocate in LIFO order: C, B, A
        allocator.release(c);
        allocator.release(b);
        allocator.release(a);
    }
    assert_eq!(allocator.used(), 0);
}

#[test]
fn test_stack_blocks_are_aligned_and_disjoint() {
    let allocator = stack(8192);
    let blocks: Vec<Block> = [1, 3, 8, 17, 64, 5]
        .iter()
        .zip([1, 2, 8, 16, 64, 4])
        .map(|(&size, align)| {
            let block = allocator.allocate(size, align);
            assert!(!block.is_null());
            assert_eq!(block.addr() % align, 0);
            block
        })
        .collect();

    for pair in blocks.windows(2) {
        assert!(pair[0].end().addr() <= pair[1].addr());
    }
    for block in blocks.into_iter().rev() {
        unsafe { allocator.release(block) };
    }
    assert_eq!(allocator.used(), 0);
}

#[test]
fn test_stack_exhaustion_returns_null_and_keeps_cursor() {
    let allocator = stack(4096);
    let first = allocator.allocate(1024, 8);
    assert!(!first.is_null());
    let used = allocator.used();

    let too_big = allocator.allocate(allocator.capacity(), 8);
    assert!(too_big.is_null());
    assert_eq!(too_big.size(), 0);
    assert_eq!(allocator.used(), used);

    // the failed request leaves the stack usable
    let next = allocator.allocate(16, 8);
    assert!(!next.is_null());
}

#[test]
#[should_panic(expected = "out of order release")]
fn test_stack_out_of_order_release_panics() {
    let allocator = stack(4096);
    let a = allocator.allocate(32, 8);
    let _b = allocator.allocate(32, 8);
    unsafe { allocator.release(a) };
}

#[test]
#[should_panic(expected = "does not belong to this stack allocator")]
fn test_stack_foreign_block_panics() {
    let allocator = stack(4096);
    let other = stack(4096);
    let block = other.allocate(32, 8);
    unsafe { allocator.release(block) };
}

#[test]
fn test_stack_frame_rewinds_on_drop() {
    let allocator = stack(4096);
    let outer = allocator.allocate(100, 8);
    let used = allocator.used();
    {
        let frame = StackFrame::new(&allocator);
        for _ in 0..10 {
            assert!(!frame.allocator().allocate(50, 8).is_null());
        }
        assert!(allocator.used() > used);
    }
    assert_eq!(allocator.used(), used);
    unsafe { allocator.release(outer) };
}

#[test]
fn test_stack_marker_rewind_and_stale_marker() {
    let allocator = stack(4096);
    let start = allocator.mark();
    allocator.allocate(128, 8);
    let middle = allocator.mark();
    allocator.allocate(128, 8);

    allocator.rewind(start).unwrap();
    let err = allocator.rewind(middle).unwrap_err();
    assert_eq!(err.code(), "MEM:STACK:MARKER");
}

#[test]
fn test_stack_peak_and_release_all() {
    let allocator = stack(4096);
    for _ in 0..4 {
        allocator.allocate(256, 8);
    }
    let peak = allocator.peak();
    assert!(peak >= 1024);

    unsafe { allocator.release_all() };
    assert_eq!(allocator.used(), 0);
    assert_eq!(allocator.peak(), peak);
    assert_eq!(allocator.total_memory(), Some(allocator.capacity()));
}

#[test]
fn test_stack_top_block_grows_in_place() {
    let allocator = Allocator::stack(4096).unwrap();
    let block = allocator.allocate(64, 8);
    unsafe {
        block.as_mut_slice().fill(7);
        let grown = allocator.reallocate(block, 512, 8);
        assert_eq!(grown.ptr(), block.ptr());
        assert_eq!(grown.size(), 512);
        assert!(grown.as_slice()[..64].iter().all(|&x| x == 7));
        allocator.release(grown);
    }
    assert_eq!(allocator.used_memory(), 0);
}

#[test]
#[should_panic(expected = "only the top block can grow")]
fn test_stack_non_top_block_cannot_grow() {
    let allocator = stack(4096);
    let a = allocator.allocate(64, 8);
    let _b = allocator.allocate(64, 8);
    unsafe { allocator.reallocate(a, 128, 8) };
}
