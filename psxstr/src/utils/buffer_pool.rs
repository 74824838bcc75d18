use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A shared pool of frame assembly buffers.
///
/// Every video channel being demuxed holds one buffer while its frame is
/// incomplete. Buffers handed out are zero-filled to the requested length, so
/// chunks that never arrive read back as zero.
#[derive(Debug, Clone)]
pub struct BufferPool {
    pool: Arc<Mutex<VecDeque<Vec<u8>>>>,
    max_size: usize,
    buffer_capacity: usize,
}

impl BufferPool {
    /// Creates a new buffer pool.
    ///
    /// # Arguments
    ///
    /// * `max_size` - Maximum number of idle buffers kept for reuse
    /// * `buffer_capacity` - Initial capacity for freshly allocated buffers
    pub fn new(max_size: usize, buffer_capacity: usize) -> Self {
        Self {
            pool: Arc::new(Mutex::new(VecDeque::with_capacity(max_size))),
            max_size,
            buffer_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Takes a buffer of exactly `len` zero bytes.
    pub fn acquire(&self, len: usize) -> Vec<u8> {
        let mut buffer = self
            .lock()
            .pop_front()
            .unwrap_or_else(|| Vec::with_capacity(self.buffer_capacity.max(len)));
        buffer.resize(len, 0);
        buffer
    }

    /// Returns a buffer to the pool for reuse.
    pub fn release(&self, mut buffer: Vec<u8>) {
        buffer.clear();

        let mut pool = self.lock();
        if pool.len() < self.max_size {
            pool.push_back(buffer);
        }
    }

    pub fn idle(&self) -> usize {
        self.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        // Roughly a 320x240 frame at typical compression.
        Self::new(8, 16 * 2016)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_buffers_are_zeroed() {
        let pool = BufferPool::new(2, 16);

        let mut buffer = pool.acquire(4);
        buffer.copy_from_slice(&[1, 2, 3, 4]);
        pool.release(buffer);
        assert_eq!(pool.idle(), 1);

        let buffer = pool.acquire(6);
        assert_eq!(buffer, vec![0; 6]);
        assert_eq!(pool.idle(), 0);

        for _ in 0..3 {
            pool.release(Vec::new());
        }
        assert_eq!(pool.idle(), 2);
    }
}
