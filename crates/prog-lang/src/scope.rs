use rustc_hash::FxHashMap;

use crate::types::ProgType;
use crate::value::{DictKey, Value};

/// Name bindings with case-insensitive lookup and stacked frames for loop variables.
///
/// The outermost frame holds program parameters; collection extensions push one frame
/// for their loop variable, which shadows any outer binding of the same name.
#[derive(Debug, Clone)]
pub struct Scope<T> {
    frames: Vec<FxHashMap<DictKey, T>>,
}

impl<T> Default for Scope<T> {
    fn default() -> Self {
        Self {
            frames: vec![FxHashMap::default()],
        }
    }
}

impl<T> Scope<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: T) -> Self {
        self.define(name, value);
        self
    }

    /// Binds `name` in the innermost frame, replacing an existing binding there.
    pub fn define(&mut self, name: &str, value: T) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(DictKey::new(name), value);
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&T> {
        let key = DictKey::new(name);
        self.frames.iter().rev().find_map(|frame| frame.get(&key))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Runs `f` with a fresh innermost frame that is discarded afterwards.
    pub fn with_frame<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.frames.push(FxHashMap::default());
        let result = f(self);
        self.frames.pop();
        result
    }

    /// Names visible from the innermost frame, without duplicates.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for frame in self.frames.iter().rev() {
            for key in frame.keys() {
                if !names.iter().any(|n| n.eq_ignore_ascii_case(key.as_str())) {
                    names.push(key.to_string());
                }
            }
        }
        names.sort_by_key(|n| n.to_ascii_lowercase());
        names
    }
}

impl<'a, T> FromIterator<(&'a str, T)> for Scope<T> {
    fn from_iter<I: IntoIterator<Item = (&'a str, T)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Scope::new(), |scope, (name, value)| scope.with(name, value))
    }
}

/// Static types of the variables visible while compiling.
pub type Declarations = Scope<ProgType>;

/// Runtime variable bindings for one execution, plus the user-program call depth.
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    variables: Scope<Value>,
    call_depth: u32,
}

impl VariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty scope for a user program invoked `call_depth` levels deep.
    pub fn nested(call_depth: u32) -> Self {
        Self {
            variables: Scope::new(),
            call_depth,
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.define(name, value.into());
        self
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.variables.define(name, value);
    }

    pub fn resolve(&self, name: &str) -> Option<&Value> {
        self.variables.resolve(name)
    }

    pub fn with_frame<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.variables.frames.push(FxHashMap::default());
        let result = f(self);
        self.variables.frames.pop();
        result
    }

    pub fn call_depth(&self) -> u32 {
        self.call_depth
    }
}
