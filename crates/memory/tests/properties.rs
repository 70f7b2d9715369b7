//! Property tests for allocator invariants

use ambit_memory::{
    Allocator, Block, LeakTrackingAllocator, MemoryUsage, PoolAllocator, PoolConfig,
    RawAllocator, StackAllocator,
};
use proptest::prelude::*;

fn request() -> impl Strategy<Value = (usize, usize)> {
    (1usize..512, 0u32..7).prop_map(|(size, shift)| (size, 1 << shift))
}

fn overlaps(a: Block, b: Block) -> bool {
    a.addr() < b.addr() + b.size() && b.addr() < a.addr() + a.size()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn stack_blocks_are_aligned_disjoint_and_unwind(requests in prop::collection::vec(request(), 1..64)) {
        let stack = StackAllocator::new(1 << 16).unwrap();
        let mut live = Vec::new();
        for (size, align) in requests {
            let block = stack.allocate(size, align);
            if block.is_null() {
                continue;
            }
            prop_assert_eq!(block.addr() % align, 0);
            prop_assert!(live.iter().all(|other| !overlaps(block, *other)));
            live.push(block);
        }
        while let Some(block) = live.pop() {
            unsafe { stack.release(block) };
        }
        prop_assert_eq!(stack.used(), 0);
    }

    #[test]
    fn stack_exhaustion_leaves_cursor_alone(extra in 0usize..4096) {
        let stack = StackAllocator::new(4096).unwrap();
        let filler = stack.allocate(stack.capacity() / 2, 1);
        prop_assert!(!filler.is_null());
        let used = stack.used();
        let denied = stack.allocate(stack.available() + extra, 1);
        prop_assert!(denied.is_null());
        prop_assert_eq!(stack.used(), used);
    }

    #[test]
    fn pool_pages_bound_live_slots(ops in prop::collection::vec(any::<bool>(), 1..200)) {
        let config = PoolConfig::new(48, 8);
        let pool = PoolAllocator::new(config).unwrap();
        let mut live = Vec::new();
        let mut high_water = 0usize;

        for allocate in ops {
            if allocate || live.is_empty() {
                let block = pool.allocate(48, 8);
                prop_assert!(!block.is_null());
                live.push(block);
                high_water = high_water.max(live.len());
            } else {
                let block = live.swap_remove(0);
                unsafe { pool.release(block) };
            }
            let stats = pool.stats();
            prop_assert_eq!(stats.live_slots, live.len());
            prop_assert_eq!(stats.live_slots + stats.free_slots, stats.slot_count);
        }
        prop_assert_eq!(pool.stats().page_count, high_water.div_ceil(8));
    }

    #[test]
    fn pool_reuses_most_recent_release(count in 2usize..40, pick in any::<prop::sample::Index>()) {
        let pool = PoolAllocator::new(PoolConfig::new(32, 16)).unwrap();
        let blocks: Vec<_> = (0..count).map(|_| pool.allocate(32, 8)).collect();
        let victim = blocks[pick.index(count)];
        unsafe { pool.release(victim) };
        prop_assert_eq!(pool.allocate(32, 8).addr(), victim.addr());
    }

    #[test]
    fn tracker_counts_match(sizes in prop::collection::vec(1usize..1024, 0..50), keep in any::<prop::sample::Index>()) {
        let tracker = LeakTrackingAllocator::new(Allocator::general());
        let blocks: Vec<_> = sizes.iter().map(|&size| tracker.allocate(size, 8)).collect();
        let kept = if blocks.is_empty() { 0 } else { keep.index(blocks.len() + 1) };

        for block in &blocks[kept..] {
            unsafe { tracker.release(*block) };
        }
        prop_assert_eq!(tracker.outstanding_count(), kept);
        prop_assert_eq!(tracker.used_memory(), sizes[..kept].iter().sum::<usize>());

        for block in &blocks[..kept] {
            unsafe { tracker.release(*block) };
        }
        prop_assert!(tracker.report().is_clean());
    }
}
