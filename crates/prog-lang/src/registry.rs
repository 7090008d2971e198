//! Name resolution tables consulted by the compiler.
//!
//! A [`Registry`] holds four kinds of entries: built-in function overloads,
//! collection extensions, dot-reference properties and user programs. Overloads of the
//! same name are tried in registration order and the first match wins.
pub mod builtin;
pub mod extension;
pub mod property;

use std::fmt::Debug;
use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use crate::Shared;
use crate::error::runtime::RuntimeError;
use crate::types::{ObjectKind, ProgType, Scalar};
use crate::value::{DictKey, Value};

pub use builtin::{BuiltinFunctionDoc, FunctionSignature, NodeFactory, Param, ReturnRule};
pub use extension::{ExtensionReturn, ExtensionSignature};
pub use property::{PropertyOwner, PropertySignature, PropertyType};

/// The registry with the standard library, shared by callers that do not register
/// anything of their own.
pub static STANDARD_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::default);

/// A program written by a game author and callable from scripts as `@name(args)`.
pub trait UserProgram: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn parameter_types(&self) -> Vec<ProgType>;

    fn return_type(&self) -> ProgType;

    /// Runs the program with already evaluated arguments. `call_depth` is the depth of
    /// the caller; implementations refuse to run beyond their configured limit.
    fn invoke(&self, args: Vec<Value>, call_depth: u32) -> Result<Value, RuntimeError>;
}

/// Static information about one argument at a call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArgType {
    pub ty: ProgType,
    pub literal: bool,
}

#[derive(Debug, Clone)]
pub struct Registry {
    functions: FxHashMap<DictKey, Vec<FunctionSignature>>,
    extensions: FxHashMap<DictKey, Vec<ExtensionSignature>>,
    properties: FxHashMap<DictKey, Vec<PropertySignature>>,
    programs: FxHashMap<DictKey, Vec<Shared<dyn UserProgram>>>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::empty();
        builtin::register_standard(&mut registry);
        extension::register_standard(&mut registry);
        property::register_standard(&mut registry);
        tracing::debug!(
            functions = registry.functions.values().map(Vec::len).sum::<usize>(),
            extensions = registry.extensions.values().map(Vec::len).sum::<usize>(),
            properties = registry.properties.values().map(Vec::len).sum::<usize>(),
            "standard registry populated"
        );
        registry
    }
}

impl Registry {
    /// A registry with nothing registered, not even the standard library.
    pub fn empty() -> Self {
        Self {
            functions: FxHashMap::default(),
            extensions: FxHashMap::default(),
            properties: FxHashMap::default(),
            programs: FxHashMap::default(),
        }
    }

    pub fn register_builtin(&mut self, signature: FunctionSignature) {
        self.functions
            .entry(DictKey::new(&signature.name))
            .or_default()
            .push(signature);
    }

    pub fn register_collection_extension(&mut self, signature: ExtensionSignature) {
        self.extensions
            .entry(DictKey::new(&signature.name))
            .or_default()
            .push(signature);
    }

    pub fn register_dot_reference(&mut self, signature: PropertySignature) {
        self.properties
            .entry(DictKey::new(&signature.name))
            .or_default()
            .push(signature);
    }

    /// Exposes `ProgObject::property(name)` of every `kind` object as `.name`.
    pub fn register_object_property(&mut self, kind: ObjectKind, name: &str, ty: ProgType) {
        let property = name.to_string();
        self.register_dot_reference(PropertySignature::new(
            name,
            PropertyOwner::Type(ProgType::object(kind)),
            PropertyType::Fixed(ty),
            move |target| match target {
                Value::Object(object) => Ok(object.property(&property).unwrap_or_default()),
                other => Err(RuntimeError::invalid_types(&property, std::slice::from_ref(other))),
            },
        ));
    }

    /// Registers a user program. A program with the same name and parameter types
    /// replaces the earlier one.
    pub fn register_program(&mut self, program: Shared<dyn UserProgram>) {
        let overloads = self.programs.entry(DictKey::new(program.name())).or_default();
        let parameters = program.parameter_types();

        match overloads.iter_mut().find(|p| p.parameter_types() == parameters) {
            Some(existing) => {
                tracing::warn!(name = program.name(), "replacing previously registered program");
                *existing = program;
            }
            None => {
                tracing::debug!(name = program.name(), "program registered");
                overloads.push(program);
            }
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(&DictKey::new(name))
    }

    /// First overload of `name` accepting `args`, or `None` when nothing matches.
    pub fn resolve_builtin(&self, name: &str, args: &[ArgType]) -> Option<&FunctionSignature> {
        self.functions
            .get(&DictKey::new(name))?
            .iter()
            .find(|signature| signature.matches(args))
    }

    pub fn resolve_extension(&self, name: &str, element: &ProgType, inner: &ProgType) -> Option<&ExtensionSignature> {
        self.extensions
            .get(&DictKey::new(name))?
            .iter()
            .find(|signature| signature.matches(element, inner))
    }

    /// Properties registered for the exact owner type win over shape-wide ones.
    pub fn resolve_property(&self, owner: &ProgType, name: &str) -> Option<&PropertySignature> {
        let candidates = self.properties.get(&DictKey::new(name))?;
        candidates
            .iter()
            .find(|p| matches!(p.owner, PropertyOwner::Type(ty) if ty == *owner))
            .or_else(|| candidates.iter().find(|p| p.owner.accepts(owner)))
    }

    pub fn resolve_program(&self, name: &str, args: &[ProgType]) -> Option<Shared<dyn UserProgram>> {
        self.programs.get(&DictKey::new(name))?.iter().find_map(|program| {
            let parameters = program.parameter_types();
            (parameters.len() == args.len()
                && args.iter().zip(parameters.iter()).all(|(arg, param)| arg.compatible(param)))
            .then(|| Shared::clone(program))
        })
    }

    pub fn builtins(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.values().flatten()
    }

    pub fn extensions(&self) -> impl Iterator<Item = &ExtensionSignature> {
        self.extensions.values().flatten()
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertySignature> {
        self.properties.values().flatten()
    }

    pub fn programs(&self) -> impl Iterator<Item = &Shared<dyn UserProgram>> {
        self.programs.values().flatten()
    }
}

/// Element type of a collection-shaped type, e.g. `Number` for `Number Collection`.
pub(crate) fn element_of(ty: &ProgType) -> ProgType {
    match ty {
        ProgType::Collection(s) | ProgType::Dictionary(s) => ProgType::Scalar(*s),
        ProgType::CollectionDictionary(s) => ProgType::Collection(*s),
        ProgType::Scalar(_) => ProgType::ERROR,
    }
}

pub(crate) fn collection_of(ty: &ProgType) -> ProgType {
    match ty {
        ProgType::Scalar(s) => ProgType::Collection(*s),
        _ => ProgType::Scalar(Scalar::Error),
    }
}
