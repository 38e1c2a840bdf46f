use crate::{Value, ValueError};

const MIN_CAPACITY: usize = 4;

/// A growable array of values stored on the VM heap.
///
/// Capacity doubles whenever a push would overflow it. Cloning copies every
/// element and keeps the capacity.
#[derive(Debug, PartialEq, Default)]
pub struct VMArray {
    items: Vec<Value>,
}

impl VMArray {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut array = Self::new();
        for v in values {
            array.push(v);
        }
        array
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn push(&mut self, value: Value) {
        if self.items.len() == self.items.capacity() {
            let grow_by = self.items.capacity().max(MIN_CAPACITY);
            self.items.reserve_exact(grow_by);
        }
        self.items.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.items.pop()
    }

    fn check_index(&self, index: i64) -> Result<usize, ValueError> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.items.len())
            .ok_or(ValueError::OutOfBounds {
                index,
                len: self.items.len(),
            })
    }

    pub fn get(&self, index: i64) -> Result<Value, ValueError> {
        let i = self.check_index(index)?;
        Ok(self.items[i])
    }

    pub fn set(&mut self, index: i64, value: Value) -> Result<(), ValueError> {
        let i = self.check_index(index)?;
        self.items[i] = value;
        Ok(())
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }
}

impl Clone for VMArray {
    fn clone(&self) -> Self {
        let mut items = Vec::with_capacity(self.items.capacity());
        items.extend_from_slice(&self.items);
        Self { items }
    }
}

impl<'a> IntoIterator for &'a VMArray {
    type Item = &'a Value;
    type IntoIter = core::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
