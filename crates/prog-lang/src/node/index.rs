use super::{Node, NodeRef};
use crate::error::runtime::RuntimeError;
use crate::scope::VariableScope;
use crate::types::ProgType;
use crate::value::{DictKey, Value, read, write};

const INDEXER: &str = "indexer";

/// `target[key]`. A position past the end or a missing key reads as `Null`.
#[derive(Debug)]
pub struct IndexNode {
    target: NodeRef,
    key: NodeRef,
    ty: ProgType,
}

impl IndexNode {
    pub fn new(target: NodeRef, key: NodeRef, ty: ProgType) -> Self {
        Self { target, key, ty }
    }
}

impl Node for IndexNode {
    fn return_type(&self) -> ProgType {
        self.ty
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        let target = self.target.execute(scope)?;
        let key = self.key.execute(scope)?;

        match (&target, &key) {
            (Value::Collection(items), Value::Number(n)) => Ok(n
                .to_index()
                .and_then(|i| read(items).get(i).cloned())
                .unwrap_or_default()),
            (Value::Dictionary(entries), Value::Text(k)) => {
                Ok(read(entries).get(&DictKey::new(k)).cloned().unwrap_or_default())
            }
            (Value::Null, _) => Err(RuntimeError::NullReference(INDEXER.into())),
            _ => Err(RuntimeError::invalid_types(INDEXER, &[target.clone(), key.clone()])),
        }
    }
}

/// `target[key] = value`. Writing past the end of a collection is an error; writing a
/// missing dictionary key inserts it. Evaluates to the assigned value.
#[derive(Debug)]
pub struct AssignNode {
    target: NodeRef,
    key: NodeRef,
    value: NodeRef,
}

impl AssignNode {
    pub fn new(target: NodeRef, key: NodeRef, value: NodeRef) -> Self {
        Self { target, key, value }
    }
}

impl Node for AssignNode {
    fn return_type(&self) -> ProgType {
        self.value.return_type()
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        let target = self.target.execute(scope)?;
        let key = self.key.execute(scope)?;
        let value = self.value.execute(scope)?;

        match (&target, &key) {
            (Value::Collection(items), Value::Number(n)) => {
                let mut items = write(items);
                let len = items.len();
                match n.to_index().and_then(|i| items.get_mut(i)) {
                    Some(slot) => *slot = value.clone(),
                    None => return Err(RuntimeError::IndexOutOfBounds { index: *n, len }),
                }
            }
            (Value::Dictionary(entries), Value::Text(k)) => {
                write(entries).insert(DictKey::new(k), value.clone());
            }
            (Value::Null, _) => return Err(RuntimeError::NullReference(INDEXER.into())),
            _ => return Err(RuntimeError::invalid_types(INDEXER, &[target.clone(), key.clone()])),
        }

        Ok(value)
    }
}
