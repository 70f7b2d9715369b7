//! Build containers inside allocator scopes and check what they left behind
//!
//! Run with `cargo run -p ambit-memory --example scoped_containers`.

use ambit_memory::prelude::*;

fn main() -> MemoryResult<()> {
    ambit_log::auto_init().ok();

    // frame-scoped scratch work in an arena, dropped wholesale afterwards
    let frame = Allocator::arena(ArenaConfig::default())?;
    let summary = context::with_allocator(frame.clone(), || {
        let mut words: Map<Str, usize> = Map::new();
        for word in "to be or not to be".split(' ') {
            if let Some(count) = words.get_mut(word) {
                *count += 1;
            } else {
                words.insert(Str::from_str_in(word, frame.clone()), 1);
            }
        }
        let mut summary = Str::new();
        for (word, count) in &words {
            use core::fmt::Write as _;
            let _ = write!(summary, "{word}={count} ");
        }
        summary
    });
    println!("words: {summary}");
    println!("frame arena used {} bytes", frame.used_memory());
    drop(summary);
    unsafe { frame.release_all() };

    // fixed-size nodes from a pool, watched by a leak tracker
    let pool = Allocator::pool(PoolConfig::new(256, 32))?;
    let tracked = Allocator::leak_tracking(pool);
    {
        let _scope = context::scope(tracked.clone());
        let mut queue: Ring<u64> = Ring::new();
        queue.extend(0..16);
        while let Some(job) = queue.pop_front() {
            if job % 4 == 0 {
                queue.push_back(job + 1);
            }
        }
    }

    if let Some(tracker) = tracked.as_leak_tracking() {
        let report = tracker.report();
        println!(
            "pool: {} allocations, leaks clean = {}",
            tracker.total_allocations(),
            report.is_clean()
        );
    }
    Ok(())
}
