use core::fmt;

const MIN_CAPACITY: usize = 8;

/// An immutable-by-convention UTF-8 string stored on the VM heap.
///
/// Appending doubles the capacity when it runs out, like [`VMArray`](crate::VMArray).
#[derive(Debug, PartialEq, Eq, Hash, Default)]
pub struct VMString {
    text: String,
}

impl VMString {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Length in Unicode scalar values.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.text.capacity()
    }

    pub fn push_str(&mut self, s: &str) {
        let needed = self.text.len() + s.len();
        if needed > self.text.capacity() {
            let mut target = self.text.capacity().max(MIN_CAPACITY);
            while target < needed {
                target *= 2;
            }
            self.text.reserve_exact(target - self.text.len());
        }
        self.text.push_str(s);
    }

    pub fn concat(&self, other: &VMString) -> VMString {
        let mut out = self.clone();
        out.push_str(other.as_str());
        out
    }
}

impl Clone for VMString {
    fn clone(&self) -> Self {
        let mut text = String::with_capacity(self.text.capacity());
        text.push_str(&self.text);
        Self { text }
    }
}

impl fmt::Display for VMString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for VMString {
    fn from(s: &str) -> Self {
        VMString::new(s)
    }
}
