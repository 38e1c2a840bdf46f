use quill_values::{HeapPayload, HeapRef, HeapValue, Payload, Value};

use super::RuntimeError;

/// The garbage-collected heap.
///
/// Allocations are addressed by [`HeapRef`] indices; freed slots are reused
/// through a free list. Collection is mark-and-sweep over an explicit root
/// set. The collection threshold adapts after every sweep: it doubles when at
/// least half of the threshold survived and halves otherwise, staying within
/// `[min_threshold, max_threshold]`.
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Option<HeapValue>>,
    free: Vec<u32>,
    live: usize,
    threshold: usize,
    min_threshold: usize,
    max_threshold: usize,
    collections: usize,
}

impl Heap {
    pub fn new(min_threshold: usize, max_threshold: usize) -> Self {
        let min_threshold = min_threshold.max(1);
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            threshold: min_threshold,
            min_threshold,
            max_threshold: max_threshold.max(min_threshold),
            collections: 0,
        }
    }

    pub fn live(&self) -> usize {
        self.live
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn collections(&self) -> usize {
        self.collections
    }

    /// Whether the next allocation should be preceded by a collection: the
    /// live count has gone past the threshold.
    pub fn needs_collection(&self) -> bool {
        self.live > self.threshold
    }

    /// Stores `payload` without collecting. Callers that own roots run
    /// [`Heap::collect`] first when [`Heap::needs_collection`] says so.
    pub fn insert(&mut self, payload: impl Into<Payload>) -> HeapRef {
        let value = HeapValue::new(payload);
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(value);
                HeapRef(index)
            }
            None => {
                self.slots.push(Some(value));
                HeapRef(self.slots.len() as u32 - 1)
            }
        }
    }

    pub fn contains(&self, r: HeapRef) -> bool {
        matches!(self.slots.get(r.0 as usize), Some(Some(_)))
    }

    pub fn get(&self, r: HeapRef) -> Result<&HeapValue, RuntimeError> {
        self.slots
            .get(r.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RuntimeError::invalid_program(format!("dangling heap reference #{}", r.0)))
    }

    pub fn get_mut(&mut self, r: HeapRef) -> Result<&mut HeapValue, RuntimeError> {
        self.slots
            .get_mut(r.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| RuntimeError::invalid_program(format!("dangling heap reference #{}", r.0)))
    }

    /// Reads the payload `value` points at as a `T`.
    pub fn get_as<T: HeapPayload>(&self, value: Value) -> Result<&T, RuntimeError> {
        match value {
            Value::Heap(r) => Ok(self.get(r)?.downcast::<T>()?),
            Value::Null => Err(RuntimeError::NullReference),
            other => Err(RuntimeError::TypeMismatch {
                expected: "object",
                found: other.type_name(),
            }),
        }
    }

    pub fn get_as_mut<T: HeapPayload>(&mut self, value: Value) -> Result<&mut T, RuntimeError> {
        match value {
            Value::Heap(r) => Ok(self.get_mut(r)?.downcast_mut::<T>()?),
            Value::Null => Err(RuntimeError::NullReference),
            other => Err(RuntimeError::TypeMismatch {
                expected: "object",
                found: other.type_name(),
            }),
        }
    }

    /// Marks everything reachable from `roots`, frees the rest and adapts the
    /// threshold. Returns the number of freed allocations.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = Value>) -> usize {
        let mut pending: Vec<HeapRef> = roots
            .into_iter()
            .filter_map(|value| match value {
                Value::Heap(r) => Some(r),
                _ => None,
            })
            .collect();

        while let Some(r) = pending.pop() {
            if let Some(Some(value)) = self.slots.get_mut(r.0 as usize) {
                if value.mark() {
                    value.payload().for_each_ref(|child| pending.push(child));
                }
            }
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            match slot {
                Some(value) if value.is_marked() => value.unmark(),
                Some(_) => {
                    *slot = None;
                    self.free.push(index as u32);
                    freed += 1;
                }
                None => {}
            }
        }

        self.live -= freed;
        self.collections += 1;
        let previous = self.threshold;
        self.adapt_threshold();
        tracing::debug!(
            freed,
            live = self.live,
            threshold = self.threshold,
            previous_threshold = previous,
            "garbage collected"
        );
        freed
    }

    fn adapt_threshold(&mut self) {
        self.threshold = if self.live * 2 >= self.threshold {
            (self.threshold * 2).min(self.max_threshold)
        } else {
            (self.threshold / 2).max(self.min_threshold)
        };
    }

    pub fn iter(&self) -> impl Iterator<Item = (HeapRef, &HeapValue)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (HeapRef(i as u32), v)))
    }
}

#[cfg(test)]
#[path = "heap_test.rs"]
mod heap_test;
