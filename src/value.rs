use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{ClassDecl, FunctionDecl, StructDecl};
use crate::interpreter::environment::ScopeChain;

/// Nesting depth past which `Display` stops descending into containers.
const MAX_DISPLAY_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Function(Rc<Function>),
    Class(Rc<ClassDef>),
    Struct(Rc<StructDef>),
    Instance(Rc<Instance>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(left_bool), Value::Bool(right_bool)) => left_bool == right_bool,
            (Value::Int(left_int), Value::Int(right_int)) => left_int == right_int,
            (Value::Float(left_float), Value::Float(right_float)) => left_float == right_float,
            (Value::String(left_str), Value::String(right_str)) => left_str == right_str,
            (Value::Array(left_arr), Value::Array(right_arr)) => Rc::ptr_eq(left_arr, right_arr),
            (Value::Function(left_fn), Value::Function(right_fn)) => Rc::ptr_eq(left_fn, right_fn),
            (Value::Class(left_class), Value::Class(right_class)) => Rc::ptr_eq(left_class, right_class),
            (Value::Struct(left_def), Value::Struct(right_def)) => Rc::ptr_eq(left_def, right_def),
            (Value::Instance(left_obj), Value::Instance(right_obj)) => Rc::ptr_eq(left_obj, right_obj),
            _ => false,
        }
    }
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::String(Rc::from(text.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(int_value) = self {
            Some(*int_value)
        } else {
            None
        }
    }

    /// Type name used in error messages. Instances report their class or struct name.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "Null".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Array(_) => "Array".to_string(),
            Value::Function(_) => "Function".to_string(),
            Value::Class(_) => "Class".to_string(),
            Value::Struct(_) => "Struct".to_string(),
            Value::Instance(instance) => instance.type_name.to_string(),
        }
    }

    /// Struct instances are records with value semantics: a new binding gets its
    /// own copy of the fields. Everything else is shared by reference.
    pub fn copy_for_binding(self) -> Value {
        match &self {
            Value::Instance(instance) if instance.is_struct() => {
                Value::Instance(Rc::new(instance.duplicate()))
            }
            _ => self,
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Value::String(s) if depth > 0 => write!(f, "\"{}\"", s),
            Value::Array(_) | Value::Instance(_) if depth >= MAX_DISPLAY_DEPTH => f.write_str("..."),
            Value::Array(array) => {
                f.write_str("[")?;
                for (i, item) in array.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_nested(f, depth + 1)?;
                }
                f.write_str("]")
            }
            Value::Instance(instance) => {
                let fields = instance.fields.borrow();
                if fields.is_empty() {
                    return write!(f, "{} {{}}", instance.type_name);
                }
                write!(f, "{} {{ ", instance.type_name)?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: ", name)?;
                    value.fmt_nested(f, depth + 1)?;
                }
                f.write_str(" }")
            }
            other => other.fmt_scalar(f),
        }
    }

    fn fmt_scalar(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => f.write_str(s),
            Value::Function(function) => match &function.decl.name {
                Some(name) => write!(f, "<function {}>", name),
                None => f.write_str("<lambda>"),
            },
            Value::Class(class) => write!(f, "<class {}>", class.decl.name),
            Value::Struct(def) => write!(f, "<struct {}>", def.decl.name),
            Value::Array(_) | Value::Instance(_) => self.fmt_nested(f, 0),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_nested(f, 0)
    }
}

/// A user function or lambda together with the scope chain it closed over.
pub struct Function {
    pub decl: Rc<FunctionDecl>,
    pub closure: ScopeChain,
}

impl Function {
    pub fn name(&self) -> &str {
        self.decl.name.as_deref().unwrap_or("<lambda>")
    }

    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("params", &self.decl.params)
            .finish_non_exhaustive()
    }
}

pub struct ClassDef {
    pub decl: Rc<ClassDecl>,
    pub methods: IndexMap<Rc<str>, Rc<Function>>,
    /// Scope chain field initializers are evaluated in.
    pub closure: ScopeChain,
}

impl ClassDef {
    pub fn method(&self, name: &str) -> Option<Rc<Function>> {
        self.methods.get(name).cloned()
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.decl.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct StructDef {
    pub decl: Rc<StructDecl>,
}

#[derive(Debug, Clone)]
pub enum InstanceKind {
    Class(Rc<ClassDef>),
    Struct(Rc<StructDef>),
}

#[derive(Debug)]
pub struct Instance {
    pub type_name: Rc<str>,
    pub kind: InstanceKind,
    pub fields: RefCell<IndexMap<Rc<str>, Value>>,
}

impl Instance {
    pub fn new(type_name: Rc<str>, kind: InstanceKind, fields: IndexMap<Rc<str>, Value>) -> Self {
        Self {
            type_name,
            kind,
            fields: RefCell::new(fields),
        }
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.kind, InstanceKind::Struct(_))
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.borrow().contains_key(name)
    }

    /// Overwrites an existing field. Returns false when the field is not declared.
    pub fn set_field(&self, name: &str, value: Value) -> bool {
        match self.fields.borrow_mut().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn duplicate(&self) -> Instance {
        let fields = self
            .fields
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone().copy_for_binding()))
            .collect();
        Instance::new(self.type_name.clone(), self.kind.clone(), fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: i64, y: i64) -> Value {
        let decl = Rc::new(StructDecl {
            name: Rc::from("Point"),
            fields: vec![Rc::from("x"), Rc::from("y")],
            span: crate::diagnostic::Span::dummy(),
        });
        let mut fields = IndexMap::new();
        fields.insert(Rc::from("x"), Value::Int(x));
        fields.insert(Rc::from("y"), Value::Int(y));
        Value::Instance(Rc::new(Instance::new(
            Rc::from("Point"),
            InstanceKind::Struct(Rc::new(StructDef { decl })),
            fields,
        )))
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::Int(14).to_string(), "14");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Null.to_string(), "None");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::string("Hello").to_string(), "Hello");
    }

    #[test]
    fn test_display_array() {
        let arr = Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(arr.to_string(), "[1, 2, 3]");

        let mixed = Value::array(vec![Value::string("a"), Value::Null, Value::array(vec![])]);
        assert_eq!(mixed.to_string(), "[\"a\", None, []]");
    }

    #[test]
    fn test_display_self_referencing_array_terminates() {
        let arr = Value::array(vec![Value::Int(1)]);
        if let Value::Array(inner) = &arr {
            inner.borrow_mut().push(arr.clone());
        }
        assert!(arr.to_string().contains("..."));
        if let Value::Array(inner) = &arr {
            inner.borrow_mut().clear();
        }
    }

    #[test]
    fn test_arrays_compare_by_identity() {
        let arr = Value::array(vec![Value::Int(1)]);
        assert_eq!(arr, arr.clone());
        assert_ne!(arr, Value::array(vec![Value::Int(1)]));
    }

    #[test]
    fn test_display_instance() {
        assert_eq!(point(3, 4).to_string(), "Point { x: 3, y: 4 }");
    }

    #[test]
    fn test_struct_copy_does_not_alias() {
        let original = point(3, 4);
        let copy = original.clone().copy_for_binding();
        if let Value::Instance(instance) = &copy {
            assert!(instance.set_field("x", Value::Int(99)));
        }
        assert_eq!(original.to_string(), "Point { x: 3, y: 4 }");
        assert_eq!(copy.to_string(), "Point { x: 99, y: 4 }");
    }
}
