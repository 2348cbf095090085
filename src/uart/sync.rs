//! Scheduler primitives for kernel mode.
//!
//! Readers and writers take separate locks so a blocked reader never holds
//! up transmission. The receive interrupt wakes a blocked reader through
//! `rx_data`.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

pub(crate) struct KernelSync {
    pub read_lock: Mutex<CriticalSectionRawMutex, ()>,
    pub write_lock: Mutex<CriticalSectionRawMutex, ()>,
    pub rx_data: Signal<CriticalSectionRawMutex, ()>,
    block: AtomicBool,
}

impl KernelSync {
    pub const fn new() -> Self {
        Self {
            read_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
            rx_data: Signal::new(),
            block: AtomicBool::new(false),
        }
    }

    pub fn set_block(&self, on: bool) {
        self.block.store(on, Ordering::Release);
    }

    pub fn block(&self) -> bool {
        self.block.load(Ordering::Acquire)
    }
}
