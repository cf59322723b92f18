use crate::prelude::PipelineError;

/// Scoped pool of encode buffers that caps how many attempts may be in flight.
pub struct BufferPool {
    buffers: Vec<Vec<u8>>,
    max_capacity: usize,
    outstanding: usize,
}

impl BufferPool {
    pub fn with_capacity(max_capacity: usize) -> Self {
        Self {
            buffers: Vec::with_capacity(max_capacity),
            max_capacity,
            outstanding: 0,
        }
    }

    /// Hands out an empty buffer, reusing a released one when available.
    pub fn checkout(&mut self) -> Result<Vec<u8>, PipelineError> {
        if self.outstanding >= self.max_capacity {
            return Err(PipelineError::Internal("encode buffer pool depleted".into()));
        }
        self.outstanding += 1;
        Ok(self.buffers.pop().unwrap_or_default())
    }

    /// Returns a buffer back to the pool for reuse.
    pub fn release(&mut self, mut buffer: Vec<u8>) {
        buffer.clear();
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.buffers.len() < self.max_capacity {
            self.buffers.push(buffer);
        }
    }

    /// Marks a checked-out buffer as handed off to the caller for good.
    pub fn detach(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    pub fn reset(&mut self) {
        self.buffers.clear();
        self.outstanding = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_buffers_are_reused_empty() {
        let mut pool = BufferPool::with_capacity(1);
        let mut buffer = pool.checkout().unwrap();
        buffer.extend_from_slice(&[1, 2, 3]);
        let capacity = buffer.capacity();
        pool.release(buffer);

        let reused = pool.checkout().unwrap();
        assert!(reused.is_empty());
        assert_eq!(reused.capacity(), capacity);
    }

    #[test]
    fn checkout_fails_when_depleted() {
        let mut pool = BufferPool::with_capacity(1);
        let _held = pool.checkout().unwrap();
        assert!(matches!(pool.checkout(), Err(PipelineError::Internal(_))));
        pool.detach();
        assert!(pool.checkout().is_ok());
    }
}
