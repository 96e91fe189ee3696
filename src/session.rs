//! Per-session interning factories, diagnostics and cancellation.
//!
//! A [`Session`] owns every interner table: variables, constants, literals,
//! function symbols, predicates and function terms. Handle equality implies
//! semantic equality within one session. Factories are never process-wide;
//! a session is created in a scope and dropped when the scope ends.
//!
//! The tables sit behind a single short lock so that interning works through
//! a shared reference; every interning operation is a map probe plus at most
//! one arena push.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;

use crate::id::{ConstId, FnTermId, LitId, PredId, SymId, VarId};
use crate::term::{Term, Value};

/// Reserved predicate name for equality atoms.
pub const EQUALITY_NAME: &str = "=";
/// Reserved predicate name for the absurd head of constraints.
pub const ABSURD_NAME: &str = "!";
/// Namespace prefix of computed-function predicates.
pub const FUNC_PREFIX: &str = "__func__";
/// The reserved comparison operator names.
pub const COMPARISON_OPERATORS: [&str; 5] = ["<", "<=", ">", ">=", "!="];

/// A cooperative cancellation flag.
///
/// Long-running loops (rewriting rounds, chase steps, homomorphism search at
/// atom boundaries) poll the flag and wind down when it is raised.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Safe to call from another thread.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Kinds of non-fatal diagnostics collected on the session channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    UnsafeNegation,
    UnsafeUniversal,
    UnsupportedFeature,
}

/// A diagnostic message. Warnings are collected, not raised.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Payload key for function-term interning.
#[derive(Clone, PartialEq, Eq, Hash)]
struct FnTermKey {
    symbol: SymId,
    args: Vec<Term>,
    evaluable: bool,
}

/// Arena entry for an interned function term.
#[derive(Clone)]
pub struct FnTermData {
    pub symbol: SymId,
    pub args: Vec<Term>,
    pub evaluable: bool,
    pub ground: bool,
}

struct Interner {
    variables: IndexMap<String, VarId>,
    variable_names: Vec<String>,
    constants: IndexMap<String, ConstId>,
    constant_names: Vec<String>,
    literals: IndexMap<Value, LitId>,
    symbols: IndexMap<String, SymId>,
    predicates: IndexMap<(String, usize), PredId>,
    fn_terms: IndexMap<FnTermKey, FnTermId>,
    fn_term_data: Vec<FnTermData>,
    fresh_counter: u64,
}

impl Interner {
    fn new() -> Self {
        Interner {
            variables: IndexMap::new(),
            variable_names: Vec::new(),
            constants: IndexMap::new(),
            constant_names: Vec::new(),
            literals: IndexMap::new(),
            symbols: IndexMap::new(),
            predicates: IndexMap::new(),
            fn_terms: IndexMap::new(),
            fn_term_data: Vec::new(),
            fresh_counter: 0,
        }
    }
}

/// The session: interning factories plus the diagnostic channel and the
/// cancellation flag shared with long-running loops.
pub struct Session {
    interner: Mutex<Interner>,
    diagnostics: Mutex<Vec<Diagnostic>>,
    cancel: CancelFlag,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            interner: Mutex::new(Interner::new()),
            diagnostics: Mutex::new(Vec::new()),
            cancel: CancelFlag::new(),
        }
    }

    /// The session's cancellation flag.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Record a diagnostic and mirror it through the `log` facade.
    pub fn warn(&self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.diagnostics.lock().push(Diagnostic { kind, message });
    }

    /// Drain the collected diagnostics.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock())
    }

    // ------------------------------------------------------------------
    // Interning factories
    // ------------------------------------------------------------------

    /// Intern a named variable. Idempotent within the session.
    pub fn variable(&self, name: &str) -> Term {
        let mut t = self.interner.lock();
        if let Some(&id) = t.variables.get(name) {
            return Term::Variable(id);
        }
        let id = VarId::from_index(t.variable_names.len());
        t.variable_names.push(name.to_string());
        t.variables.insert(name.to_string(), id);
        Term::Variable(id)
    }

    /// A fresh variable never returned by name lookup.
    ///
    /// Fresh variables have identity semantics: two calls with the same hint
    /// produce distinct variables.
    pub fn fresh_variable(&self, hint: &str) -> Term {
        let mut t = self.interner.lock();
        t.fresh_counter += 1;
        let name = format!("_{}{}", hint, t.fresh_counter);
        let id = VarId::from_index(t.variable_names.len());
        t.variable_names.push(name);
        Term::Variable(id)
    }

    /// A fresh blank constant, used as a labeled null for existential
    /// witnesses. Blank names live in the reserved `_:` namespace and are
    /// never returned by name lookup.
    pub fn fresh_blank(&self, hint: &str) -> Term {
        let mut t = self.interner.lock();
        t.fresh_counter += 1;
        let name = format!("_:{}{}", hint, t.fresh_counter);
        let id = ConstId::from_index(t.constant_names.len());
        t.constant_names.push(name);
        Term::Constant(id)
    }

    /// True iff the constant is a labeled null created by
    /// [`Session::fresh_blank`].
    pub fn is_blank(&self, term: Term) -> bool {
        match term {
            Term::Constant(id) => self.constant_name(id).starts_with("_:"),
            _ => false,
        }
    }

    /// Intern a constant. Idempotent within the session.
    pub fn constant(&self, name: &str) -> Term {
        let mut t = self.interner.lock();
        if let Some(&id) = t.constants.get(name) {
            return Term::Constant(id);
        }
        let id = ConstId::from_index(t.constant_names.len());
        t.constant_names.push(name.to_string());
        t.constants.insert(name.to_string(), id);
        Term::Constant(id)
    }

    /// Intern a literal value. Idempotent within the session.
    pub fn literal(&self, value: Value) -> Term {
        let mut t = self.interner.lock();
        if let Some(&id) = t.literals.get(&value) {
            return Term::Literal(id);
        }
        let id = LitId::from_index(t.literals.len());
        t.literals.insert(value, id);
        Term::Literal(id)
    }

    /// Shorthand for integer literals.
    pub fn int(&self, i: i64) -> Term {
        self.literal(Value::Integer(i))
    }

    /// Intern a function symbol name.
    pub fn symbol(&self, name: &str) -> SymId {
        let mut t = self.interner.lock();
        if let Some(&id) = t.symbols.get(name) {
            return id;
        }
        let id = SymId::from_index(t.symbols.len());
        t.symbols.insert(name.to_string(), id);
        id
    }

    /// Intern a predicate by name and arity.
    pub fn predicate(&self, name: &str, arity: usize) -> PredId {
        let mut t = self.interner.lock();
        if let Some(&id) = t.predicates.get(&(name.to_string(), arity)) {
            return id;
        }
        let id = PredId::from_index(t.predicates.len());
        t.predicates.insert((name.to_string(), arity), id);
        id
    }

    /// The reserved equality predicate.
    pub fn equality_predicate(&self) -> PredId {
        self.predicate(EQUALITY_NAME, 2)
    }

    /// The reserved absurd predicate used as the head of constraints.
    pub fn absurd_predicate(&self) -> PredId {
        self.predicate(ABSURD_NAME, 0)
    }

    /// The reserved comparison predicate for an operator.
    pub fn comparison_predicate(&self, op: &str) -> PredId {
        debug_assert!(COMPARISON_OPERATORS.contains(&op));
        self.predicate(op, 2)
    }

    /// The computed predicate standing for a function of `input_arity`
    /// inputs; the extra position holds the result.
    pub fn function_predicate(&self, name: &str, input_arity: usize) -> PredId {
        self.predicate(&format!("{FUNC_PREFIX}{name}"), input_arity + 1)
    }

    /// Intern a function term. Groundness is computed once and cached.
    pub fn function_term(&self, symbol: SymId, args: Vec<Term>, evaluable: bool) -> Term {
        let ground = args.iter().all(|&a| self.is_ground(a));
        let mut t = self.interner.lock();
        let key = FnTermKey {
            symbol,
            args: args.clone(),
            evaluable,
        };
        if let Some(&id) = t.fn_terms.get(&key) {
            return Term::Function(id);
        }
        let id = FnTermId::from_index(t.fn_term_data.len());
        t.fn_term_data.push(FnTermData {
            symbol,
            args,
            evaluable,
            ground,
        });
        t.fn_terms.insert(key, id);
        Term::Function(id)
    }

    /// An uninterpreted (logical) function term, e.g. a skolem witness.
    pub fn logical_function_term(&self, name: &str, args: Vec<Term>) -> Term {
        let symbol = self.symbol(name);
        self.function_term(symbol, args, false)
    }

    /// An evaluable function term, rewritten into a computed atom at query
    /// preparation time.
    pub fn evaluable_function_term(&self, name: &str, args: Vec<Term>) -> Term {
        let symbol = self.symbol(name);
        self.function_term(symbol, args, true)
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    pub fn variable_name(&self, id: VarId) -> String {
        self.interner.lock().variable_names[id.index()].clone()
    }

    pub fn constant_name(&self, id: ConstId) -> String {
        self.interner.lock().constant_names[id.index()].clone()
    }

    pub fn literal_value(&self, id: LitId) -> Value {
        let t = self.interner.lock();
        let (value, _) = t.literals.get_index(id.index()).expect("literal id");
        value.clone()
    }

    pub fn symbol_name(&self, id: SymId) -> String {
        let t = self.interner.lock();
        let (name, _) = t.symbols.get_index(id.index()).expect("symbol id");
        name.clone()
    }

    pub fn predicate_name(&self, id: PredId) -> String {
        let t = self.interner.lock();
        let ((name, _), _) = t.predicates.get_index(id.index()).expect("predicate id");
        name.clone()
    }

    pub fn predicate_arity(&self, id: PredId) -> usize {
        let t = self.interner.lock();
        let ((_, arity), _) = t.predicates.get_index(id.index()).expect("predicate id");
        *arity
    }

    /// Resolve a function term's payload.
    pub fn fn_term(&self, id: FnTermId) -> FnTermData {
        self.interner.lock().fn_term_data[id.index()].clone()
    }

    /// True iff the predicate is the reserved equality predicate.
    pub fn is_equality(&self, id: PredId) -> bool {
        self.predicate_name(id) == EQUALITY_NAME && self.predicate_arity(id) == 2
    }

    /// True iff the predicate belongs to the computed-function namespace.
    pub fn is_function_predicate(&self, id: PredId) -> bool {
        self.predicate_name(id).starts_with(FUNC_PREFIX)
    }

    // ------------------------------------------------------------------
    // Term utilities
    // ------------------------------------------------------------------

    /// Groundness: a term with no variable anywhere inside it.
    pub fn is_ground(&self, term: Term) -> bool {
        match term {
            Term::Variable(_) => false,
            Term::Constant(_) | Term::Literal(_) => true,
            Term::Function(id) => self.interner.lock().fn_term_data[id.index()].ground,
        }
    }

    /// Collect the variables occurring in a term.
    pub fn term_variables(&self, term: Term, out: &mut IndexSet<VarId>) {
        match term {
            Term::Variable(v) => {
                out.insert(v);
            }
            Term::Constant(_) | Term::Literal(_) => {}
            Term::Function(id) => {
                let args = self.fn_term(id).args;
                for arg in args {
                    self.term_variables(arg, out);
                }
            }
        }
    }

    /// True iff the term is or contains an evaluable function term.
    pub fn contains_evaluable(&self, term: Term) -> bool {
        match term {
            Term::Function(id) => {
                let data = self.fn_term(id);
                data.evaluable || data.args.iter().any(|&a| self.contains_evaluable(a))
            }
            _ => false,
        }
    }

    /// Human-readable rendering of a term.
    pub fn display_term(&self, term: Term) -> String {
        match term {
            Term::Variable(v) => self.variable_name(v),
            Term::Constant(c) => self.constant_name(c),
            Term::Literal(l) => self.literal_value(l).to_string(),
            Term::Function(id) => {
                let data = self.fn_term(id);
                let args: Vec<String> = data.args.iter().map(|&a| self.display_term(a)).collect();
                format!("{}({})", self.symbol_name(data.symbol), args.join(", "))
            }
        }
    }
}
