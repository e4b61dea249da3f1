use crate::error::{Error, Result};
use log::debug;
use rufutex::rufutex::SharedFutex;
use rushm::posixaccessor::POSIXShm;
use std::time::Duration;

/// Futex rung by publishers whenever the notification ring grows.
pub struct Doorbell {
    shm: POSIXShm<i32>,
    futex: SharedFutex,
    closed: bool,
}

impl Doorbell {
    pub fn open(mem_path: &str) -> Result<Self> {
        let name = mem_path.to_string() + "_doorbell";
        let mut shm = POSIXShm::<i32>::new(name, std::mem::size_of::<i32>());
        unsafe {
            shm.open().map_err(|e| {
                Error::shared_memory(format!("Error opening shared memory for doorbell: {e}"))
            })?;
        }
        let ptr_shm = shm.get_cptr_mut();
        let futex = SharedFutex::new(ptr_shm);
        Ok(Doorbell {
            shm,
            futex,
            closed: false,
        })
    }

    /// Wakes every waiter.
    pub fn ring(&mut self) {
        self.futex.post_with_value(1, u32::MAX);
    }

    /// Waits for a ring, at most `timeout`.
    pub fn wait(&mut self, timeout: Duration) {
        let timeout_spec = libc::timespec {
            tv_sec: timeout.as_secs() as i64,
            tv_nsec: timeout.subsec_nanos() as i64,
        };
        self.futex.wait_with_timeout(0, timeout_spec);
        if self.futex.get_futex_value() != 0 {
            debug!("Doorbell rang");
        }
        self.futex.set_futex_value(0);
    }

    pub fn close(&mut self, unlink: bool) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let ret: std::result::Result<(), String>;
        unsafe {
            ret = self.shm.close(unlink);
        }
        ret.map_err(|e| Error::shared_memory(format!("Error closing doorbell: {e}")))
    }
}

impl Drop for Doorbell {
    fn drop(&mut self) {
        if let Err(e) = self.close(false) {
            debug!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::unique_path;
    use std::time::Instant;

    #[test]
    fn test_wait_times_out() {
        let path = unique_path("doorbell_timeout");
        let mut doorbell = Doorbell::open(&path).unwrap();
        let start = Instant::now();
        doorbell.wait(Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_secs(5));
        let _ = doorbell.close(true);
    }

    #[test]
    fn test_ring_wakes_waiter() {
        let path = unique_path("doorbell_ring");
        let mut doorbell = Doorbell::open(&path).unwrap();

        let waiter_path = path.clone();
        let handle = std::thread::spawn(move || {
            let mut doorbell = Doorbell::open(&waiter_path).unwrap();
            let start = Instant::now();
            doorbell.wait(Duration::from_secs(10));
            start.elapsed()
        });

        // Sleep for a bit to allow the thread to start
        std::thread::sleep(Duration::from_millis(100));
        doorbell.ring();
        let waited = handle.join().unwrap();
        assert!(waited < Duration::from_secs(10));
        let _ = doorbell.close(true);
    }
}
