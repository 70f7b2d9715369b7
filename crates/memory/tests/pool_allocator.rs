//! Integration tests for Pool allocator

use std::collections::HashSet;

use ambit_memory::{
    Allocator, ArenaConfig, Block, MemoryUsage, PoolAllocator, PoolConfig, RawAllocator,
};

#[test]
fn test_pool_grows_one_page_at_a_time() {
    let pool = PoolAllocator::new(PoolConfig::new(64, 16)).unwrap();

    let blocks: Vec<Block> = (0..17).map(|_| pool.allocate(64, 8)).collect();
    assert!(blocks.iter().all(|b| !b.is_null() && b.size() == 64));

    let distinct: HashSet<usize> = blocks.iter().map(Block::addr).collect();
    assert_eq!(distinct.len(), 17);

    let stats = pool.stats();
    assert_eq!(stats.page_count, 2);
    assert_eq!(stats.slot_count, 32);
    assert_eq!(stats.live_slots, 17);

    // the 17th slot comes from the second page
    let first_page = blocks[0].addr()..blocks[0].addr() + 64 * 16;
    assert!(first_page.contains(&blocks[15].addr()));
    assert!(!first_page.contains(&blocks[16].addr()));
}

#[test]
fn test_pool_released_slot_is_reused_first() {
    let pool = PoolAllocator::new(PoolConfig::for_type::<u64>(32)).unwrap();
    let a = pool.allocate(8, 8);
    let b = pool.allocate(8, 8);
    unsafe { pool.release(a) };
    let c = pool.allocate(8, 8);
    assert_eq!(c.addr(), a.addr());
    assert_ne!(c.addr(), b.addr());
}

#[test]
fn test_pool_used_memory_tracks_live_slots() {
    let pool = PoolAllocator::new(PoolConfig::new(128, 16)).unwrap();
    let blocks: Vec<_> = (0..8).map(|_| pool.allocate(100, 8)).collect();
    assert_eq!(pool.used_memory(), 8 * 128);
    for block in blocks {
        unsafe { pool.release(block) };
    }
    assert_eq!(pool.used_memory(), 0);
    assert_eq!(pool.stats().free_slots, 16);
}

#[test]
fn test_pool_over_arena_backing() {
    let arena = Allocator::arena(ArenaConfig::compact()).unwrap();
    let pool = Allocator::pool_over(PoolConfig::new(32, 8).with_align(32), arena.clone()).unwrap();

    for _ in 0..20 {
        let block = pool.allocate(32, 32);
        assert_eq!(block.addr() % 32, 0);
    }
    // three pages of 8 slots came out of the arena
    assert_eq!(arena.used_memory(), 3 * 8 * 32);
}

#[test]
fn test_pool_null_when_backing_is_exhausted() {
    let stack = Allocator::stack(4096).unwrap();
    let capacity = stack.as_stack().map_or(0, |s| s.capacity());
    let config = PoolConfig::new(64, capacity / 64 / 2);
    let pool = PoolAllocator::with_backing(config, stack).unwrap();

    let per_page = config.slots_per_page;
    for _ in 0..per_page {
        assert!(!pool.allocate(64, 8).is_null());
    }
    // a second page no longer fits next to the first plus its header
    let block = pool.allocate(64, 8);
    assert!(block.is_null());
}

#[test]
#[should_panic(expected = "exceeds slot alignment")]
fn test_pool_rejects_over_aligned_request() {
    let pool = PoolAllocator::new(PoolConfig::new(64, 4)).unwrap();
    pool.allocate(64, 64);
}

#[test]
fn test_pool_release_all_empties_pool() {
    let backing = Allocator::leak_tracking(Allocator::general());
    let pool = PoolAllocator::with_backing(PoolConfig::new(16, 4), backing.clone()).unwrap();
    for _ in 0..10 {
        pool.allocate(16, 8);
    }
    unsafe { pool.release_all() };
    assert_eq!(pool.stats().page_count, 0);
    let tracker = backing.as_leak_tracking().unwrap();
    assert_eq!(tracker.outstanding_count(), 0);
    assert_eq!(tracker.invalid_releases(), 0);
}

#[test]
fn test_pool_refill_after_shuffled_release_needs_no_new_pages() {
    let pool = PoolAllocator::new(PoolConfig::new(64, 16)).unwrap();
    let mut blocks: Vec<Block> = (0..40).map(|_| pool.allocate(64, 8)).collect();
    let pages = pool.stats().page_count;
    assert_eq!(pages, 3);

    // release in an interleaved order
    let (even, odd): (Vec<_>, Vec<_>) = blocks.drain(..).enumerate().partition(|(i, _)| i % 2 == 0);
    for (_, block) in odd.into_iter().rev().chain(even) {
        unsafe { pool.release(block) };
    }

    let refill: HashSet<usize> = (0..40).map(|_| pool.allocate(64, 8).addr()).collect();
    assert_eq!(refill.len(), 40);
    assert_eq!(pool.stats().page_count, pages);
}

#[test]
fn test_pool_over_stack_returns_pages_newest_first() {
    let stack = Allocator::stack(1 << 16).unwrap();
    let pool = PoolAllocator::with_backing(PoolConfig::new(64, 4), stack.clone()).unwrap();
    for _ in 0..9 {
        assert!(!pool.allocate(64, 8).is_null());
    }
    assert_eq!(pool.stats().page_count, 3);

    unsafe { pool.release_all() };
    assert_eq!(stack.used_memory(), 0);

    for _ in 0..9 {
        pool.allocate(64, 8);
    }
    drop(pool);
    assert_eq!(stack.as_stack().map(|s| s.used()), Some(0));
}
