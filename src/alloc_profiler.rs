//! Global allocator wrapper that counts heap traffic, for pool-reuse checks.
//!
//! Install it in a test or binary with `#[global_allocator] static A: TrackingAllocator = TrackingAllocator;`.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct TrackingAllocator;

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static BYTES_ALLOCATED: AtomicU64 = AtomicU64::new(0);
static BYTES_FREED: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocationSnapshot {
    pub allocations: u64,
    pub bytes_allocated: u64,
    pub bytes_freed: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocationDelta {
    /// Calls to `alloc`, `alloc_zeroed` and `realloc`.
    pub allocations: u64,
    pub allocated_bytes: u64,
    pub deallocated_bytes: u64,
}

impl AllocationDelta {
    pub fn net_bytes(&self) -> i64 {
        self.allocated_bytes as i64 - self.deallocated_bytes as i64
    }
}

impl AllocationSnapshot {
    pub fn delta_since(&self, previous: AllocationSnapshot) -> AllocationDelta {
        AllocationDelta {
            allocations: self.allocations.saturating_sub(previous.allocations),
            allocated_bytes: self.bytes_allocated.saturating_sub(previous.bytes_allocated),
            deallocated_bytes: self.bytes_freed.saturating_sub(previous.bytes_freed),
        }
    }
}

pub fn allocation_snapshot() -> AllocationSnapshot {
    AllocationSnapshot {
        allocations: ALLOCATIONS.load(Ordering::Relaxed),
        bytes_allocated: BYTES_ALLOCATED.load(Ordering::Relaxed),
        bytes_freed: BYTES_FREED.load(Ordering::Relaxed),
    }
}

/// Runs `f` and reports the heap traffic it caused on every thread.
pub fn measure<R>(f: impl FnOnce() -> R) -> (R, AllocationDelta) {
    let before = allocation_snapshot();
    let result = f();
    (result, allocation_snapshot().delta_since(before))
}

fn record_alloc(size: usize) {
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    BYTES_ALLOCATED.fetch_add(size as u64, Ordering::Relaxed);
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        BYTES_FREED.fetch_add(layout.size() as u64, Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            record_alloc(new_size);
            BYTES_FREED.fetch_add(layout.size() as u64, Ordering::Relaxed);
        }
        new_ptr
    }
}
