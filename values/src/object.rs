use crate::{Value, ValueError};

/// An instance of a script struct. `type_index` points into the program's
/// static-object table, which holds the member names.
#[derive(Debug, Clone, PartialEq)]
pub struct VMObject {
    pub type_index: u32,
    fields: Vec<Value>,
}

impl VMObject {
    /// Creates an object with every field set to `null`.
    pub fn new(type_index: u32, field_count: usize) -> Self {
        Self {
            type_index,
            fields: vec![Value::Null; field_count],
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, index: usize) -> Result<Value, ValueError> {
        self.fields.get(index).copied().ok_or(ValueError::NoSuchField {
            index,
            count: self.fields.len(),
        })
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<(), ValueError> {
        let count = self.fields.len();
        let slot = self
            .fields
            .get_mut(index)
            .ok_or(ValueError::NoSuchField { index, count })?;
        *slot = value;
        Ok(())
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }
}
