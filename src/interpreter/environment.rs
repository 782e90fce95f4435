use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

use super::error::InterpreterError;
use crate::diagnostic::Span;
use crate::value::{Instance, Value};

/// A binding is either live or explicitly deleted. Deleted slots stay in
/// place so a later read reports the deletion instead of falling through
/// to an outer binding of the same name.
#[derive(Debug, Clone)]
enum Slot {
    Live(Value),
    Deleted,
}

/// One layer of the lexical chain.
#[derive(Debug, Default)]
struct Scope {
    bindings: RefCell<IndexMap<Rc<str>, Slot>>,
    /// Set for the layer a method call inserts between its closure and its
    /// parameters; bare field names resolve against the receiver here.
    receiver: Option<Rc<Instance>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    fn child(parent: Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            parent: Some(parent),
            ..Scope::default()
        })
    }
}

enum Lookup {
    Found(Value),
    Deleted,
    Missing,
}

/// A frozen scope chain captured by a closure or class declaration.
#[derive(Debug, Clone)]
pub struct ScopeChain(Rc<Scope>);

impl ScopeChain {
    /// The chain with the receiver's fields layered on top, used as the
    /// parent of a method's call scope.
    pub fn with_receiver(&self, receiver: Rc<Instance>) -> ScopeChain {
        ScopeChain(Rc::new(Scope {
            bindings: RefCell::default(),
            receiver: Some(receiver),
            parent: Some(self.0.clone()),
        }))
    }
}

/// Handle to the active scope chain. Clones share the same cursor, so a
/// guard holding a clone can restore the chain when it drops.
#[derive(Debug, Clone)]
pub struct Environment {
    current: Rc<RefCell<Rc<Scope>>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            current: Rc::new(RefCell::new(Rc::new(Scope::default()))),
        }
    }

    /// A fresh handle whose innermost scope is a new child of `chain`.
    pub fn from_chain(chain: &ScopeChain) -> Self {
        Self {
            current: Rc::new(RefCell::new(Scope::child(chain.0.clone()))),
        }
    }

    fn head(&self) -> Rc<Scope> {
        self.current.borrow().clone()
    }

    pub fn capture(&self) -> ScopeChain {
        ScopeChain(self.head())
    }

    pub fn push_scope(&self) {
        let child = Scope::child(self.head());
        *self.current.borrow_mut() = child;
    }

    /// Leaves the innermost scope, tearing it down unless it escaped.
    pub fn pop_scope(&self) {
        let parent = self.head().parent.clone();
        if let Some(parent) = parent {
            let released = std::mem::replace(&mut *self.current.borrow_mut(), parent);
            release_scope(released);
        }
    }

    /// Pushes a scope that is popped when the guard drops, on every exit path.
    pub fn scope(&self) -> ScopeGuard {
        let previous = self.head();
        self.push_scope();
        ScopeGuard {
            env: self.clone(),
            previous,
        }
    }

    /// Switches to a new scope on top of `chain` (a call frame), restoring
    /// the caller's chain when the guard drops.
    pub fn enter(&self, chain: &ScopeChain) -> ScopeGuard {
        let previous = self.head();
        *self.current.borrow_mut() = Scope::child(chain.0.clone());
        ScopeGuard {
            env: self.clone(),
            previous,
        }
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = Some(self.head());
        while let Some(current) = scope {
            depth += 1;
            scope = current.parent.clone();
        }
        depth
    }

    /// Binds `name` in the innermost scope. Re-declaring a deleted name in
    /// the same scope revives it.
    pub fn declare(&self, name: Rc<str>, value: Value) {
        self.head()
            .bindings
            .borrow_mut()
            .insert(name, Slot::Live(value));
    }

    fn lookup(&self, name: &str) -> Lookup {
        let mut scope = Some(self.head());
        while let Some(current) = scope {
            if let Some(receiver) = &current.receiver {
                if let Some(value) = receiver.get_field(name) {
                    return Lookup::Found(value);
                }
            }
            match current.bindings.borrow().get(name) {
                Some(Slot::Live(value)) => return Lookup::Found(value.clone()),
                Some(Slot::Deleted) => return Lookup::Deleted,
                None => {}
            }
            scope = current.parent.clone();
        }
        Lookup::Missing
    }

    pub fn get(&self, name: &str) -> Result<Value, InterpreterError> {
        match self.lookup(name) {
            Lookup::Found(value) => Ok(value),
            Lookup::Deleted => Err(InterpreterError::deleted_access(name)),
            Lookup::Missing => Err(InterpreterError::name_error(name)),
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        matches!(self.lookup(name), Lookup::Found(_))
    }

    /// Overwrites the nearest binding of `name`. Never creates one.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), InterpreterError> {
        let mut scope = Some(self.head());
        while let Some(current) = scope {
            if let Some(receiver) = &current.receiver {
                if receiver.set_field(name, value.clone()) {
                    return Ok(());
                }
            }
            if let Some(slot) = current.bindings.borrow_mut().get_mut(name) {
                return match slot {
                    Slot::Live(existing) => {
                        *existing = value;
                        Ok(())
                    }
                    Slot::Deleted => Err(InterpreterError::deleted_access(name)),
                };
            }
            scope = current.parent.clone();
        }
        Err(InterpreterError::name_error(name))
    }

    /// Marks the nearest binding of `name` deleted. Instance fields are not
    /// variables: a field visible under `name` cannot be deleted, and the
    /// search stops there rather than reaching a hidden outer binding.
    pub fn delete(&self, name: &str) -> Result<(), InterpreterError> {
        let mut scope = Some(self.head());
        while let Some(current) = scope {
            if let Some(receiver) = &current.receiver {
                if receiver.has_field(name) {
                    return Err(InterpreterError::type_mismatch_at(
                        "'delete'",
                        format!("'{}' is a field of '{}', not a variable", name, receiver.type_name),
                        Span::dummy(),
                    ));
                }
            }
            if let Some(slot) = current.bindings.borrow_mut().get_mut(name) {
                return match slot {
                    Slot::Live(_) => {
                        *slot = Slot::Deleted;
                        Ok(())
                    }
                    Slot::Deleted => Err(InterpreterError::deleted_access(name)),
                };
            }
            scope = current.parent.clone();
        }
        Err(InterpreterError::name_error(name))
    }

    /// Drops every binding in the innermost scope. Closures stored in the
    /// global scope reference that scope, so the interpreter clears it on
    /// shutdown to release the cycle.
    pub fn clear(&self) {
        let bindings = std::mem::take(&mut *self.head().bindings.borrow_mut());
        drop(bindings);
    }
}

/// Drops the bindings of a scope that has just been left, unless something
/// outside the scope still holds it.
///
/// A function declared in a scope captures that scope, and the binding
/// holding the function keeps the function alive: an `Rc` cycle. When every
/// remaining reference to the scope comes from values it owns itself, the
/// scope is unreachable and its bindings are dropped to break the cycle.
fn release_scope(scope: Rc<Scope>) {
    let internal = scope
        .bindings
        .borrow()
        .values()
        .map(|slot| match slot {
            Slot::Live(value) => owned_references(value, &scope),
            Slot::Deleted => 0,
        })
        .sum::<usize>();
    if Rc::strong_count(&scope) == 1 + internal {
        tracing::trace!(bindings = scope.bindings.borrow().len(), "tearing down released scope");
        let bindings = std::mem::take(&mut *scope.bindings.borrow_mut());
        drop(bindings);
    }
}

/// References to `scope` held through `value`, counting only paths made of
/// values with no other owner.
fn owned_references(value: &Value, scope: &Rc<Scope>) -> usize {
    match value {
        Value::Function(function) if Rc::strong_count(function) == 1 => chain_references(&function.closure.0, scope),
        Value::Class(class) if Rc::strong_count(class) == 1 => {
            let methods: usize = class
                .methods
                .values()
                .filter(|method| Rc::strong_count(method) == 1)
                .map(|method| chain_references(&method.closure.0, scope))
                .sum();
            chain_references(&class.closure.0, scope) + methods
        }
        Value::Array(array) if Rc::strong_count(array) == 1 => array
            .borrow()
            .iter()
            .map(|item| owned_references(item, scope))
            .sum(),
        Value::Instance(instance) if Rc::strong_count(instance) == 1 => instance
            .fields
            .borrow()
            .values()
            .map(|field| owned_references(field, scope))
            .sum(),
        _ => 0,
    }
}

/// 1 when `start` is `scope`, or reaches it through scopes nothing else holds.
fn chain_references(start: &Rc<Scope>, scope: &Rc<Scope>) -> usize {
    if Rc::ptr_eq(start, scope) {
        return 1;
    }
    match &start.parent {
        Some(parent) if Rc::strong_count(start) == 1 => chain_references(parent, scope),
        _ => 0,
    }
}

/// Restores the chain that was active before a scope was pushed or entered.
pub struct ScopeGuard {
    env: Environment,
    previous: Rc<Scope>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let released = std::mem::replace(&mut *self.env.current.borrow_mut(), self.previous.clone());
        release_scope(released);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FunctionBody, FunctionDecl};
    use crate::value::{Function, InstanceKind, StructDef};

    fn name(text: &str) -> Rc<str> {
        Rc::from(text)
    }

    /// A function value closing over the environment's current scope.
    fn closure_here(env: &Environment, function_name: &str) -> Value {
        let decl = Rc::new(FunctionDecl {
            name: Some(name(function_name)),
            params: Vec::new(),
            body: FunctionBody::Block(Vec::new()),
            span: Span::dummy(),
        });
        Value::Function(Rc::new(Function {
            decl,
            closure: env.capture(),
        }))
    }

    fn counter_instance() -> Rc<Instance> {
        let decl = Rc::new(crate::ast::StructDecl {
            name: name("Counter"),
            fields: vec![name("count")],
            span: Span::dummy(),
        });
        let mut fields = IndexMap::new();
        fields.insert(name("count"), Value::Int(0));
        Rc::new(Instance::new(
            name("Counter"),
            InstanceKind::Struct(Rc::new(StructDef { decl })),
            fields,
        ))
    }

    #[test]
    fn test_declare_and_get() {
        let env = Environment::new();
        env.declare(name("x"), Value::Int(42));
        assert_eq!(env.get("x").unwrap(), Value::Int(42));
        assert!(matches!(env.get("y"), Err(InterpreterError::NameError { .. })));
    }

    #[test]
    fn test_scope_push_pop() {
        let env = Environment::new();
        env.declare(name("x"), Value::Int(1));

        env.push_scope();
        env.declare(name("x"), Value::Int(2));
        assert_eq!(env.get("x").unwrap(), Value::Int(2));

        env.pop_scope();
        assert_eq!(env.get("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_assign_reaches_outer_scope() {
        let env = Environment::new();
        env.declare(name("i"), Value::Int(0));
        {
            let _guard = env.scope();
            env.assign("i", Value::Int(1)).unwrap();
        }
        assert_eq!(env.get("i").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_assign_never_declares() {
        let env = Environment::new();
        assert!(matches!(
            env.assign("ghost", Value::Null),
            Err(InterpreterError::NameError { .. })
        ));
        assert!(!env.is_defined("ghost"));
    }

    #[test]
    fn test_guard_pops_scope() {
        let env = Environment::new();
        let depth = env.depth();
        {
            let _guard = env.scope();
            env.declare(name("tmp"), Value::Int(1));
            assert_eq!(env.depth(), depth + 1);
        }
        assert_eq!(env.depth(), depth);
        assert!(!env.is_defined("tmp"));
    }

    #[test]
    fn test_deleted_binding_shadows_outer() {
        let env = Environment::new();
        env.declare(name("v"), Value::Int(1));
        env.push_scope();
        env.declare(name("v"), Value::Int(2));
        env.delete("v").unwrap();

        assert!(matches!(env.get("v"), Err(InterpreterError::DeletedAccess { .. })));
        assert!(matches!(
            env.assign("v", Value::Int(3)),
            Err(InterpreterError::DeletedAccess { .. })
        ));
        assert!(matches!(env.delete("v"), Err(InterpreterError::DeletedAccess { .. })));
    }

    #[test]
    fn test_redeclare_revives_deleted() {
        let env = Environment::new();
        env.declare(name("z"), Value::Int(1));
        env.delete("z").unwrap();
        env.declare(name("z"), Value::Int(5));
        assert_eq!(env.get("z").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_capture_sees_later_mutation() {
        let env = Environment::new();
        env.declare(name("count"), Value::Int(0));
        let chain = env.capture();
        env.assign("count", Value::Int(7)).unwrap();

        let frame = Environment::from_chain(&chain);
        assert_eq!(frame.get("count").unwrap(), Value::Int(7));
    }

    #[test]
    fn test_enter_restores_caller_chain() {
        let env = Environment::new();
        env.declare(name("outer"), Value::Int(1));
        let closure = Environment::new();
        closure.declare(name("inner"), Value::Int(2));

        {
            let _frame = env.enter(&closure.capture());
            assert!(env.is_defined("inner"));
            assert!(!env.is_defined("outer"));
        }
        assert!(env.is_defined("outer"));
        assert!(!env.is_defined("inner"));
    }

    #[test]
    fn test_receiver_fields_resolve_as_bare_names() {
        let instance = counter_instance();
        let env = Environment::new();
        let chain = env.capture().with_receiver(instance.clone());
        let frame = Environment::from_chain(&chain);
        assert_eq!(frame.get("count").unwrap(), Value::Int(0));
        frame.assign("count", Value::Int(3)).unwrap();
        assert_eq!(instance.get_field("count"), Some(Value::Int(3)));
    }

    #[test]
    fn test_delete_stops_at_receiver_field() {
        let env = Environment::new();
        env.declare(name("count"), Value::Int(5));
        let frame = Environment::from_chain(&env.capture().with_receiver(counter_instance()));

        assert!(matches!(frame.delete("count"), Err(InterpreterError::TypeMismatch { .. })));
        assert_eq!(env.get("count").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_released_scope_with_local_function_is_freed() {
        let env = Environment::new();
        let released = {
            let _guard = env.scope();
            let function = closure_here(&env, "local");
            env.declare(name("local"), function);
            let scope = Rc::downgrade(&env.capture().0);
            scope
        };
        assert!(released.upgrade().is_none());
    }

    #[test]
    fn test_popped_scope_with_function_in_array_is_freed() {
        let env = Environment::new();
        env.push_scope();
        let items = Value::array(vec![closure_here(&env, "inner")]);
        env.declare(name("items"), items);
        let released = Rc::downgrade(&env.capture().0);
        env.pop_scope();
        assert!(released.upgrade().is_none());
    }

    #[test]
    fn test_escaped_scope_keeps_its_bindings() {
        let env = Environment::new();
        let escaped = {
            let _guard = env.scope();
            env.declare(name("k"), Value::Int(7));
            let function = closure_here(&env, "adder");
            env.declare(name("adder"), function.clone());
            function
        };
        let Value::Function(function) = escaped else {
            panic!("expected a function");
        };
        let frame = Environment::from_chain(&function.closure);
        assert_eq!(frame.get("k").unwrap(), Value::Int(7));
        assert!(frame.is_defined("adder"));
    }
}
