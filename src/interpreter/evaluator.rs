use indexmap::IndexMap;
use std::rc::Rc;

use super::control_flow::ControlFlow;
use super::environment::Environment;
use super::error::{InterpreterError, ToyError};
use super::operators::{eval_binary_op, eval_unary_op};
use super::parser::parse;
use crate::ast::{
    AssignTarget, ClassDecl, Expr, ExprKind, FunctionBody, FunctionDecl, Literal, LogicalOp, Program, Stmt,
    StructDecl,
};
use crate::diagnostic::Span;
use crate::io::{BufferedIo, IoChannel};
use crate::stack::ensure_sufficient_stack;
use crate::value::{ClassDef, Function, Instance, InstanceKind, StructDef, Value};

/// Deepest chain of nested calls before evaluation is aborted.
pub const MAX_CALL_DEPTH: usize = 1000;

/// Name bound to the receiver inside a method body.
pub const RECEIVER: &str = "this";

/// Class method run with the constructor arguments, when present.
pub const CONSTRUCTOR: &str = "init";

pub struct Interpreter<'io> {
    env: Environment,
    io: &'io mut dyn IoChannel,
    call_depth: usize,
    /// False for parallel-task workers, which share the caller's globals.
    owns_globals: bool,
}

impl<'io> Interpreter<'io> {
    pub fn new(io: &'io mut dyn IoChannel) -> Self {
        Self {
            env: Environment::new(),
            io,
            call_depth: 0,
            owns_globals: true,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Parses and evaluates `source`. Globals persist across calls.
    pub fn run(&mut self, source: &str) -> Result<(), ToyError> {
        let program = parse(source)?;
        self.evaluate_program(&program)?;
        Ok(())
    }

    pub fn evaluate_program(&mut self, program: &Program) -> Result<(), InterpreterError> {
        tracing::debug!(statements = program.statements.len(), "evaluating program");
        self.execute_statements(&program.statements)?;
        Ok(())
    }

    fn execute_statements(&mut self, statements: &[Stmt]) -> Result<ControlFlow, InterpreterError> {
        for statement in statements {
            if let ControlFlow::Return(value) = self.execute_statement(statement)? {
                return Ok(ControlFlow::Return(value));
            }
        }
        Ok(ControlFlow::Next)
    }

    /// Runs `statements` in a fresh scope that is released on every exit path.
    fn execute_block(&mut self, statements: &[Stmt]) -> Result<ControlFlow, InterpreterError> {
        let _scope = self.env.scope();
        ensure_sufficient_stack(|| self.execute_statements(statements))
    }

    fn execute_statement(&mut self, statement: &Stmt) -> Result<ControlFlow, InterpreterError> {
        tracing::trace!(kind = statement.kind_name(), "execute");
        match statement {
            Stmt::Let { name, value, .. } => {
                let value = self.evaluate(value)?.copy_for_binding();
                self.env.declare(name.clone(), value);
                Ok(ControlFlow::Next)
            }
            Stmt::Assign { target, value, span } => {
                self.perform_assignment(target, value, *span)?;
                Ok(ControlFlow::Next)
            }
            Stmt::Expr(expr) => {
                self.evaluate(expr)?;
                Ok(ControlFlow::Next)
            }
            Stmt::Print { args, span } => {
                let mut parts = Vec::with_capacity(args.len());
                for arg in args {
                    parts.push(self.evaluate(arg)?.to_string());
                }
                self.io
                    .print_line(&parts.join(" "))
                    .map_err(|err| InterpreterError::from(err).at(*span))?;
                Ok(ControlFlow::Next)
            }
            Stmt::Delete { name, span } => {
                self.env.delete(name).map_err(|err| err.at(*span))?;
                tracing::debug!(name = %name, "deleted binding");
                Ok(ControlFlow::Next)
            }
            Stmt::Block(statements) => self.execute_block(statements),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate_condition(condition, "'if' condition")? {
                    self.execute_block(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute_block(else_branch)
                } else {
                    Ok(ControlFlow::Next)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate_condition(condition, "'while' condition")? {
                    if let ControlFlow::Return(value) = self.execute_block(body)? {
                        return Ok(ControlFlow::Return(value));
                    }
                }
                Ok(ControlFlow::Next)
            }
            Stmt::For {
                init,
                condition,
                update,
                body,
            } => {
                // The loop variable lives in its own scope around the iterations.
                let _scope = self.env.scope();
                if let Some(init) = init {
                    self.execute_statement(init)?;
                }
                loop {
                    if let Some(condition) = condition {
                        if !self.evaluate_condition(condition, "'for' condition")? {
                            break;
                        }
                    }
                    if let ControlFlow::Return(value) = self.execute_block(body)? {
                        return Ok(ControlFlow::Return(value));
                    }
                    if let Some(update) = update {
                        self.execute_statement(update)?;
                    }
                }
                Ok(ControlFlow::Next)
            }
            Stmt::Function(decl) => {
                let function = self.make_closure(decl);
                if let Some(name) = &decl.name {
                    self.env.declare(name.clone(), function);
                }
                Ok(ControlFlow::Next)
            }
            Stmt::Class(decl) => {
                self.declare_class(decl);
                Ok(ControlFlow::Next)
            }
            Stmt::Struct(decl) => {
                self.declare_struct(decl);
                Ok(ControlFlow::Next)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };
                Ok(ControlFlow::Return(value))
            }
            Stmt::Parallel { tasks, span } => self.execute_parallel(tasks, *span),
        }
    }

    /// Runs each task in textual order, in its own scope, with its output
    /// held back until the task ends and then emitted as one group.
    fn execute_parallel(&mut self, tasks: &[Vec<Stmt>], span: Span) -> Result<ControlFlow, InterpreterError> {
        let mut first_error = None;
        let mut first_return = None;

        for (index, task) in tasks.iter().enumerate() {
            tracing::debug!(task = index, total = tasks.len(), "running parallel task");
            let chain = self.env.capture();
            let mut buffer = BufferedIo::new(&mut *self.io);
            let outcome = {
                let mut worker = Interpreter {
                    env: Environment::from_chain(&chain),
                    io: &mut buffer,
                    call_depth: self.call_depth,
                    owns_globals: false,
                };
                worker.execute_statements(task)
            };
            tracing::debug!(task = index, lines = buffer.pending().len(), "flushing task output");
            buffer
                .flush()
                .map_err(|err| InterpreterError::from(err).at(span))?;

            match outcome {
                Ok(ControlFlow::Return(value)) => {
                    if first_return.is_none() {
                        first_return = Some(value);
                    }
                }
                Ok(ControlFlow::Next) => {}
                Err(err) => {
                    tracing::debug!(task = index, error = %err, "parallel task failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match (first_error, first_return) {
            (Some(err), _) => Err(err),
            (None, Some(value)) => Ok(ControlFlow::Return(value)),
            (None, None) => Ok(ControlFlow::Next),
        }
    }

    fn evaluate_condition(&mut self, condition: &Expr, context: &str) -> Result<bool, InterpreterError> {
        match self.evaluate(condition)? {
            Value::Bool(b) => Ok(b),
            other => Err(InterpreterError::expected_bool_at(
                context,
                &other.type_name(),
                condition.span,
            )),
        }
    }

    fn perform_assignment(&mut self, target: &AssignTarget, value: &Expr, span: Span) -> Result<(), InterpreterError> {
        match target {
            AssignTarget::Variable(name) => {
                let value = self.evaluate(value)?.copy_for_binding();
                self.env.assign(name, value).map_err(|err| err.at(span))
            }
            AssignTarget::Member { object, field } => {
                let receiver = self.evaluate(object)?;
                let value = self.evaluate(value)?.copy_for_binding();
                match receiver {
                    Value::Instance(instance) => {
                        if instance.set_field(field, value) {
                            Ok(())
                        } else {
                            Err(InterpreterError::field_not_found_at(
                                instance.type_name.to_string(),
                                field.to_string(),
                                span,
                            ))
                        }
                    }
                    other => Err(InterpreterError::field_not_found_at(
                        other.type_name(),
                        field.to_string(),
                        span,
                    )),
                }
            }
            AssignTarget::Index { target, index } => {
                let container = self.evaluate(target)?;
                let position = self.evaluate(index)?;
                let value = self.evaluate(value)?.copy_for_binding();
                match container {
                    Value::Array(array) => {
                        let mut items = array.borrow_mut();
                        let slot = checked_index(&position, items.len(), index.span)?;
                        items[slot] = value;
                        Ok(())
                    }
                    other => Err(InterpreterError::type_mismatch_at(
                        "index assignment",
                        format!("{} does not support item assignment", other.type_name()),
                        span,
                    )),
                }
            }
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, InterpreterError> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value, InterpreterError> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Int(n) => Value::Int(*n),
                Literal::Float(n) => Value::Float(*n),
                Literal::String(s) => Value::String(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
            }),
            ExprKind::Identifier(name) => self.env.get(name).map_err(|err| err.at(expr.span)),
            ExprKind::Grouped(inner) => self.evaluate(inner),
            ExprKind::Binary { left, op, right } => {
                let left_val = self.evaluate(left)?;
                let right_val = self.evaluate(right)?;
                eval_binary_op(&left_val, *op, &right_val, expr.span)
            }
            ExprKind::Logical { left, op, right } => {
                let context = match op {
                    LogicalOp::And => "'and' operation",
                    LogicalOp::Or => "'or' operation",
                };
                let left_bool = self.evaluate_condition(left, context)?;
                match (op, left_bool) {
                    (LogicalOp::And, false) => Ok(Value::Bool(false)),
                    (LogicalOp::Or, true) => Ok(Value::Bool(true)),
                    _ => self.evaluate_condition(right, context).map(Value::Bool),
                }
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.evaluate(operand)?;
                eval_unary_op(*op, &value, expr.span)
            }
            ExprKind::Lambda(decl) => Ok(self.make_closure(decl)),
            ExprKind::Call { callee, args } => {
                let callee_val = self.evaluate(callee)?;
                let args = self.evaluate_args(args)?;
                self.call_value(&callee_val, args, expr.span)
            }
            ExprKind::MethodCall { object, method, args } => {
                let receiver = self.evaluate(object)?;
                let args = self.evaluate_args(args)?;
                self.call_method(receiver, method, args, expr.span)
            }
            ExprKind::Array { elements } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate(element)?.copy_for_binding());
                }
                Ok(Value::array(items))
            }
            ExprKind::Index { target, index } => {
                let container = self.evaluate(target)?;
                let position = self.evaluate(index)?;
                get_index(&container, &position, index.span, expr.span)
            }
            ExprKind::Member { object, field } => {
                let receiver = self.evaluate(object)?;
                get_field(&receiver, field, expr.span)
            }
            ExprKind::Input { prompt } => {
                let prompt = match prompt {
                    Some(prompt) => Some(self.evaluate(prompt)?.to_string()),
                    None => None,
                };
                match self.io.read_line(prompt.as_deref()) {
                    Ok(Some(line)) => Ok(Value::string(line)),
                    Ok(None) => Err(InterpreterError::input_exhausted_at(expr.span)),
                    Err(err) => Err(InterpreterError::from(err).at(expr.span)),
                }
            }
        }
    }

    fn evaluate_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, InterpreterError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.evaluate(arg)?.copy_for_binding());
        }
        Ok(values)
    }

    fn make_closure(&self, decl: &Rc<FunctionDecl>) -> Value {
        Value::Function(Rc::new(Function {
            decl: decl.clone(),
            closure: self.env.capture(),
        }))
    }

    fn declare_class(&mut self, decl: &Rc<ClassDecl>) {
        let closure = self.env.capture();
        let methods = decl
            .methods
            .iter()
            .filter_map(|method| {
                let name = method.name.clone()?;
                let function = Rc::new(Function {
                    decl: method.clone(),
                    closure: closure.clone(),
                });
                Some((name, function))
            })
            .collect();
        let class = ClassDef {
            decl: decl.clone(),
            methods,
            closure,
        };
        tracing::debug!(name = %decl.name, fields = decl.fields.len(), "declared class");
        self.env.declare(decl.name.clone(), Value::Class(Rc::new(class)));
    }

    fn declare_struct(&mut self, decl: &Rc<StructDecl>) {
        tracing::debug!(name = %decl.name, fields = decl.fields.len(), "declared struct");
        self.env.declare(
            decl.name.clone(),
            Value::Struct(Rc::new(StructDef { decl: decl.clone() })),
        );
    }

    fn call_value(&mut self, callee: &Value, args: Vec<Value>, span: Span) -> Result<Value, InterpreterError> {
        match callee {
            Value::Function(function) => self.call_function(function, args, None, span),
            Value::Class(class) => self.instantiate_class(class, args, span),
            Value::Struct(def) => instantiate_struct(def, args, span),
            other => Err(InterpreterError::not_callable_at(other.type_name(), span)),
        }
    }

    fn call_method(&mut self, receiver: Value, method: &str, args: Vec<Value>, span: Span) -> Result<Value, InterpreterError> {
        let instance = match receiver {
            Value::Instance(instance) => instance,
            other => return Err(InterpreterError::field_not_found_at(other.type_name(), method, span)),
        };

        if let InstanceKind::Class(class) = &instance.kind {
            if let Some(function) = class.method(method) {
                return self.call_function(&function, args, Some(instance.clone()), span);
            }
        }
        // A field holding a callable, e.g. a struct storing a lambda.
        match instance.get_field(method) {
            Some(value) => self.call_value(&value, args, span),
            None => Err(InterpreterError::field_not_found_at(
                instance.type_name.to_string(),
                method,
                span,
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &Function,
        args: Vec<Value>,
        receiver: Option<Rc<Instance>>,
        span: Span,
    ) -> Result<Value, InterpreterError> {
        if args.len() != function.arity() {
            return Err(InterpreterError::arity_at(function.name(), function.arity(), args.len(), span));
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(InterpreterError::recursion_limit_at(MAX_CALL_DEPTH, span));
        }

        let chain = match &receiver {
            Some(instance) => function.closure.with_receiver(instance.clone()),
            None => function.closure.clone(),
        };
        let _frame = self.env.enter(&chain);
        if let Some(instance) = receiver {
            self.env.declare(Rc::from(RECEIVER), Value::Instance(instance));
        }
        for (param, arg) in function.decl.params.iter().zip(args) {
            self.env.declare(param.clone(), arg);
        }

        self.call_depth += 1;
        let result = ensure_sufficient_stack(|| match &function.decl.body {
            FunctionBody::Block(statements) => match self.execute_statements(statements)? {
                ControlFlow::Return(value) => Ok(value),
                ControlFlow::Next => Ok(Value::Null),
            },
            FunctionBody::Expr(body) => self.evaluate(body),
        });
        self.call_depth -= 1;
        result
    }

    fn instantiate_class(&mut self, class: &Rc<ClassDef>, args: Vec<Value>, span: Span) -> Result<Value, InterpreterError> {
        let decl = &class.decl;
        let fields = decl
            .fields
            .iter()
            .map(|field| (field.name.clone(), Value::Null))
            .collect();
        let instance = Rc::new(Instance::new(
            decl.name.clone(),
            InstanceKind::Class(class.clone()),
            fields,
        ));

        {
            // Initializers see `this` and the fields assigned before them.
            let _frame = self.env.enter(&class.closure.with_receiver(instance.clone()));
            self.env.declare(Rc::from(RECEIVER), Value::Instance(instance.clone()));
            for field in &decl.fields {
                if let Some(init) = &field.init {
                    let value = self.evaluate(init)?.copy_for_binding();
                    instance.set_field(&field.name, value);
                }
            }
        }

        if let Some(constructor) = class.method(CONSTRUCTOR) {
            self.call_function(&constructor, args, Some(instance.clone()), span)?;
        } else if !args.is_empty() {
            if args.len() != decl.fields.len() {
                return Err(InterpreterError::arity_at(
                    decl.name.to_string(),
                    decl.fields.len(),
                    args.len(),
                    span,
                ));
            }
            for (field, arg) in decl.fields.iter().zip(args) {
                instance.set_field(&field.name, arg);
            }
        }

        Ok(Value::Instance(instance))
    }
}

impl Drop for Interpreter<'_> {
    fn drop(&mut self) {
        if self.owns_globals {
            self.env.clear();
        } else {
            // A worker's innermost scope is its task scope.
            self.env.pop_scope();
        }
    }
}

fn instantiate_struct(def: &Rc<StructDef>, args: Vec<Value>, span: Span) -> Result<Value, InterpreterError> {
    let decl = &def.decl;
    if args.len() != decl.fields.len() {
        return Err(InterpreterError::arity_at(
            decl.name.to_string(),
            decl.fields.len(),
            args.len(),
            span,
        ));
    }
    let fields: IndexMap<Rc<str>, Value> = decl.fields.iter().cloned().zip(args).collect();
    Ok(Value::Instance(Rc::new(Instance::new(
        decl.name.clone(),
        InstanceKind::Struct(def.clone()),
        fields,
    ))))
}

fn get_field(receiver: &Value, field: &str, span: Span) -> Result<Value, InterpreterError> {
    match (receiver, field) {
        (Value::Instance(instance), _) => instance
            .get_field(field)
            .ok_or_else(|| InterpreterError::field_not_found_at(instance.type_name.to_string(), field, span)),
        (Value::Array(array), "length") => Ok(Value::Int(array.borrow().len() as i64)),
        (Value::String(s), "length") => Ok(Value::Int(s.chars().count() as i64)),
        (other, _) => Err(InterpreterError::field_not_found_at(other.type_name(), field, span)),
    }
}

/// Validates an index value against a container length.
fn checked_index(position: &Value, length: usize, span: Span) -> Result<usize, InterpreterError> {
    let index = position.as_int().ok_or_else(|| {
        InterpreterError::type_mismatch_at(
            "index",
            format!("expected Int, found {}", position.type_name()),
            span,
        )
    })?;
    usize::try_from(index)
        .ok()
        .filter(|slot| *slot < length)
        .ok_or_else(|| InterpreterError::index_out_of_bounds_at(index, length, span))
}

fn get_index(container: &Value, position: &Value, index_span: Span, span: Span) -> Result<Value, InterpreterError> {
    match container {
        Value::Array(array) => {
            let items = array.borrow();
            let slot = checked_index(position, items.len(), index_span)?;
            Ok(items[slot].clone())
        }
        Value::String(s) => {
            let length = s.chars().count();
            let slot = checked_index(position, length, index_span)?;
            Ok(s.chars()
                .nth(slot)
                .map(|ch| Value::string(ch.to_string()))
                .unwrap_or(Value::Null))
        }
        other => Err(InterpreterError::type_mismatch_at(
            "index",
            format!("{} is not indexable", other.type_name()),
            span,
        )),
    }
}

/// Parses and runs `source` against `io` with a fresh interpreter.
pub fn parse_and_run(source: &str, io: &mut dyn IoChannel) -> Result<(), ToyError> {
    let mut interpreter = Interpreter::new(io);
    interpreter.run(source)
}
