//! Leak-tracking wrapper
//!
//! Forwards every request to an inner [`Allocator`] and keeps a record of
//! each live block: size, alignment, a sequence number and the source
//! location that asked for it. Releasing an address the wrapper never handed
//! out is counted and logged instead of forwarded. Whatever is still recorded
//! at `release_all` or drop is reported as a leak.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::panic::Location;

#[cfg(feature = "logging")]
use ambit_log::{debug, error, warn};
use hashbrown::HashMap;

use super::{Allocator, MemoryUsage, RawAllocator};
use crate::Block;
use crate::utils::format_bytes;

#[derive(Debug, Clone, Copy)]
struct AllocationRecord {
    size: usize,
    align: usize,
    sequence: u64,
    location: &'static Location<'static>,
}

/// One block that was never released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeakedBlock {
    /// Start address
    pub addr: usize,
    /// Size the inner allocator reported
    pub size: usize,
    /// Requested alignment
    pub align: usize,
    /// Order of the allocation, starting at zero
    pub sequence: u64,
    /// Where the allocation was requested
    pub location: &'static Location<'static>,
}

/// Outstanding blocks at the time of the report, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeakReport {
    pub leaks: Vec<LeakedBlock>,
}

impl LeakReport {
    /// No outstanding blocks
    pub fn is_clean(&self) -> bool {
        self.leaks.is_empty()
    }

    /// Sum of the leaked sizes
    pub fn leaked_bytes(&self) -> usize {
        self.leaks.iter().map(|leak| leak.size).sum()
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return f.write_str("no leaks");
        }
        writeln!(
            f,
            "{} leaked block(s), {}",
            self.leaks.len(),
            format_bytes(self.leaked_bytes())
        )?;
        for leak in &self.leaks {
            writeln!(
                f,
                "  #{} {:#x} {} bytes (align {}) allocated at {}",
                leak.sequence, leak.addr, leak.size, leak.align, leak.location
            )?;
        }
        Ok(())
    }
}

/// Allocator wrapper that records every live block
pub struct LeakTrackingAllocator {
    inner: Allocator,
    live: RefCell<HashMap<usize, AllocationRecord>>,
    sequence: Cell<u64>,
    invalid_releases: Cell<usize>,
    total_allocations: Cell<usize>,
    total_releases: Cell<usize>,
}

impl LeakTrackingAllocator {
    /// Wrap `inner`
    pub fn new(inner: Allocator) -> Self {
        #[cfg(feature = "logging")]
        debug!(inner = ?inner.kind(), "leak-tracking allocator created");

        Self {
            inner,
            live: RefCell::new(HashMap::new()),
            sequence: Cell::new(0),
            invalid_releases: Cell::new(0),
            total_allocations: Cell::new(0),
            total_releases: Cell::new(0),
        }
    }

    /// The wrapped allocator
    pub fn inner(&self) -> &Allocator {
        &self.inner
    }

    /// Blocks allocated and not yet released
    pub fn outstanding_count(&self) -> usize {
        self.live.borrow().len()
    }

    /// Bytes in outstanding blocks
    pub fn outstanding_bytes(&self) -> usize {
        self.live.borrow().values().map(|r| r.size).sum()
    }

    /// Releases of addresses this wrapper never handed out
    pub fn invalid_releases(&self) -> usize {
        self.invalid_releases.get()
    }

    /// Successful allocations since construction
    pub fn total_allocations(&self) -> usize {
        self.total_allocations.get()
    }

    /// Valid releases since construction
    pub fn total_releases(&self) -> usize {
        self.total_releases.get()
    }

    /// Whether `block` is currently recorded
    pub fn is_tracked(&self, block: Block) -> bool {
        self.live.borrow().contains_key(&block.addr())
    }

    /// Snapshot of the outstanding blocks
    pub fn report(&self) -> LeakReport {
        let live = self.live.borrow();
        Self::build_report(live.iter().map(|(&addr, &record)| (addr, record)))
    }

    /// Report the outstanding blocks and stop tracking them
    ///
    /// The blocks themselves stay allocated in the inner allocator.
    pub fn take_report(&self) -> LeakReport {
        let drained: Vec<_> = self.live.borrow_mut().drain().collect();
        Self::build_report(drained)
    }

    fn build_report(records: impl IntoIterator<Item = (usize, AllocationRecord)>) -> LeakReport {
        let mut leaks: Vec<_> = records
            .into_iter()
            .map(|(addr, r)| LeakedBlock {
                addr,
                size: r.size,
                align: r.align,
                sequence: r.sequence,
                location: r.location,
            })
            .collect();
        leaks.sort_unstable_by_key(|leak| leak.sequence);
        LeakReport { leaks }
    }

    #[track_caller]
    fn record(&self, block: Block, align: usize) {
        if block.is_null() || block.size() == 0 {
            return;
        }
        let sequence = self.sequence.get();
        self.sequence.set(sequence + 1);
        self.total_allocations.set(self.total_allocations.get() + 1);
        self.live.borrow_mut().insert(
            block.addr(),
            AllocationRecord {
                size: block.size(),
                align,
                sequence,
                location: Location::caller(),
            },
        );
    }

    #[track_caller]
    fn flag_invalid(&self, block: Block) {
        self.invalid_releases.set(self.invalid_releases.get() + 1);

        #[cfg(feature = "logging")]
        error!(
            block = ?block,
            location = %Location::caller(),
            "release of a block this allocator does not track"
        );
        #[cfg(not(feature = "logging"))]
        let _ = block;
    }

    fn log_report(report: &LeakReport, when: &'static str) {
        if report.is_clean() {
            return;
        }
        #[cfg(feature = "logging")]
        warn!(
            leaks = report.leaks.len(),
            bytes = report.leaked_bytes(),
            when,
            "memory leaks detected\n{report}"
        );
        #[cfg(not(feature = "logging"))]
        let _ = when;
    }
}

impl RawAllocator for LeakTrackingAllocator {
    #[track_caller]
    fn allocate(&self, size: usize, align: usize) -> Block {
        let block = self.inner.allocate(size, align);
        self.record(block, align);
        block
    }

    #[track_caller]
    unsafe fn release(&self, block: Block) {
        if block.is_null() || block.size() == 0 {
            return;
        }
        let known = self.live.borrow_mut().remove(&block.addr());
        match known {
            Some(record) => {
                self.total_releases.set(self.total_releases.get() + 1);
                // the inner allocator gets back the size it reported
                let block = Block::new(block.ptr(), record.size);
                // SAFETY: the block came from the inner allocator and is live
                unsafe { self.inner.release(block) };
            }
            None => self.flag_invalid(block),
        }
    }

    unsafe fn release_all(&self) {
        let report = self.take_report();
        Self::log_report(&report, "release_all");
        // SAFETY: forwarded caller contract
        unsafe { self.inner.release_all() };
    }

    #[track_caller]
    unsafe fn reallocate(&self, block: Block, new_size: usize, align: usize) -> Block {
        if block.is_null() || block.size() == 0 {
            return self.allocate(new_size, align);
        }
        if !self.live.borrow().contains_key(&block.addr()) {
            self.flag_invalid(block);
            return Block::null();
        }

        // SAFETY: the block is tracked, so it is live in the inner allocator
        let fresh = unsafe { self.inner.reallocate(block, new_size, align) };
        if fresh.is_null() && new_size > 0 {
            return fresh;
        }

        if self.live.borrow_mut().remove(&block.addr()).is_some() {
            self.total_releases.set(self.total_releases.get() + 1);
        }
        self.record(fresh, align);
        fresh
    }
}

impl MemoryUsage for LeakTrackingAllocator {
    fn used_memory(&self) -> usize {
        self.outstanding_bytes()
    }

    fn total_memory(&self) -> Option<usize> {
        self.inner.total_memory()
    }
}

impl Drop for LeakTrackingAllocator {
    fn drop(&mut self) {
        let report = self.take_report();
        Self::log_report(&report, "drop");
    }
}

impl fmt::Debug for LeakTrackingAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeakTrackingAllocator")
            .field("inner", &self.inner.kind())
            .field("outstanding", &self.outstanding_count())
            .field("invalid_releases", &self.invalid_releases.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> LeakTrackingAllocator {
        LeakTrackingAllocator::new(Allocator::general())
    }

    #[test]
    fn counts_follow_allocations_and_releases() {
        let tracker = tracker();
        let blocks: Vec<_> = (1..=5).map(|i| tracker.allocate(i * 16, 8)).collect();
        assert_eq!(tracker.outstanding_count(), 5);
        unsafe {
            tracker.release(blocks[0]);
            tracker.release(blocks[3]);
        }
        assert_eq!(tracker.outstanding_count(), 3);
        assert_eq!(tracker.total_allocations(), 5);
        assert_eq!(tracker.total_releases(), 2);
        for block in [blocks[1], blocks[2], blocks[4]] {
            unsafe { tracker.release(block) };
        }
        assert!(tracker.report().is_clean());
    }

    #[test]
    fn unknown_release_is_flagged_not_forwarded() {
        let tracker = tracker();
        let mut outside = [0u8; 32];
        unsafe { tracker.release(Block::new(outside.as_mut_ptr(), 32)) };
        assert_eq!(tracker.invalid_releases(), 1);
        assert_eq!(tracker.inner().used_memory(), 0);
    }

    #[test]
    fn report_names_call_site_in_allocation_order() {
        let tracker = tracker();
        let first = tracker.allocate(24, 8);
        let line = line!() - 1;
        let second = tracker.allocate(48, 8);

        let report = tracker.report();
        assert_eq!(report.leaks.len(), 2);
        assert_eq!(report.leaks[0].addr, first.addr());
        assert_eq!(report.leaks[0].location.file(), file!());
        assert_eq!(report.leaks[0].location.line(), line);
        assert!(report.leaks[0].sequence < report.leaks[1].sequence);
        assert_eq!(report.leaked_bytes(), 72);
        assert!(report.to_string().contains("2 leaked block(s)"));

        let taken = tracker.take_report();
        assert_eq!(taken, report);
        assert_eq!(tracker.outstanding_count(), 0);
        unsafe {
            tracker.inner().release(first);
            tracker.inner().release(second);
        }
        assert_eq!(tracker.inner().used_memory(), 0);
    }

    #[test]
    fn reallocate_moves_the_record() {
        let tracker = tracker();
        let block = tracker.allocate(16, 8);
        let grown = unsafe { tracker.reallocate(block, 4096, 8) };
        assert!(!grown.is_null());
        assert!(tracker.is_tracked(grown));
        assert_eq!(tracker.outstanding_count(), 1);
        assert_eq!(tracker.outstanding_bytes(), 4096);
        unsafe { tracker.release(grown) };
        assert_eq!(tracker.outstanding_count(), 0);
        assert_eq!(tracker.invalid_releases(), 0);
    }

    #[test]
    fn zero_size_blocks_are_not_recorded() {
        let tracker = tracker();
        let block = tracker.allocate(0, 16);
        assert!(!block.is_null());
        assert_eq!(tracker.outstanding_count(), 0);
        unsafe { tracker.release(block) };
        assert_eq!(tracker.invalid_releases(), 0);
    }
}
