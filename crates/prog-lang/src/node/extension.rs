use super::{Node, NodeRef};
use crate::ast::Ident;
use crate::error::runtime::RuntimeError;
use crate::scope::VariableScope;
use crate::types::ProgType;
use crate::value::{Value, read};

/// Runs the inner expression of a collection extension against one element.
pub type Selector<'a> = dyn FnMut(&Value) -> Result<Value, RuntimeError> + 'a;

/// Native implementation of a collection extension such as `where` or `sum`.
pub type ExtensionFn = fn(&[Value], &mut Selector<'_>) -> Result<Value, RuntimeError>;

/// `source.name(variable, inner)`: binds each element to `variable` in a fresh frame
/// and lets the extension decide how the inner results combine.
#[derive(Debug)]
pub struct ExtensionNode {
    name: Ident,
    source: NodeRef,
    variable: Ident,
    inner: NodeRef,
    func: ExtensionFn,
    ty: ProgType,
}

impl ExtensionNode {
    pub fn new(name: Ident, source: NodeRef, variable: Ident, inner: NodeRef, func: ExtensionFn, ty: ProgType) -> Self {
        Self {
            name,
            source,
            variable,
            inner,
            func,
            ty,
        }
    }
}

impl Node for ExtensionNode {
    fn return_type(&self) -> ProgType {
        self.ty
    }

    fn execute(&self, scope: &mut VariableScope) -> Result<Value, RuntimeError> {
        let items = match self.source.execute(scope)? {
            Value::Collection(items) => read(&items).clone(),
            Value::Null => return Err(RuntimeError::NullReference(self.name.clone())),
            other => return Err(RuntimeError::invalid_types(&self.name, &[other])),
        };

        scope.with_frame(|scope| {
            let mut select = |item: &Value| {
                scope.define(&self.variable, item.clone());
                self.inner.execute(scope)
            };
            (self.func)(&items, &mut select)
        })
    }
}
