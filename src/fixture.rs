//! Fixture descriptions.
//!
//! A [`FixtureType`] is the runtime view of one fixture: how to construct an instance and which methods it declares,
//! in declaration order. It is normally produced by `#[fixture]`, but [`FixtureBuilder`] builds the same data by hand.
//!
//! Steps are stored type-erased. The instance travels as `Box<dyn Any + Send>` and each step downcasts it back to the
//! concrete fixture type before calling the method.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::TestContext;
use crate::error::StepError;

/// Outcome of one hook or test step.
pub type StepResult = Result<(), StepError>;

/// Future returned by a step. Borrows the fixture instance and the context for its whole run.
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = StepResult> + Send + 'a>>;

/// A step bound to its concrete fixture type.
pub type Step<F> = for<'a> fn(&'a mut F, &'a TestContext) -> StepFuture<'a>;

/// An owned, type-erased fixture instance.
pub type FixtureInstance = Box<dyn Any + Send>;

/// Implemented by `#[fixture]` for every fixture type.
pub trait Fixture: Default + Send + 'static {
    fn fixture_type() -> FixtureType;
}

/// Conversion from a method's return value into a [`StepResult`].
pub trait IntoStepResult {
    fn into_step_result(self) -> StepResult;
}

impl IntoStepResult for () {
    fn into_step_result(self) -> StepResult {
        Ok(())
    }
}

impl<E: fmt::Display + fmt::Debug> IntoStepResult for Result<(), E> {
    fn into_step_result(self) -> StepResult {
        self.map_err(|err| StepError::Returned {
            message: err.to_string(),
            detail: format!("{err:?}"),
        })
    }
}

/// Lifecycle role of a hook method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookRole {
    SetUp,
    TearDown,
    OneTimeSetUp,
    OneTimeTearDown,
}

impl HookRole {
    pub const ALL: [HookRole; 4] = [
        HookRole::OneTimeSetUp,
        HookRole::SetUp,
        HookRole::TearDown,
        HookRole::OneTimeTearDown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookRole::SetUp => "setup",
            HookRole::TearDown => "teardown",
            HookRole::OneTimeSetUp => "one-time setup",
            HookRole::OneTimeTearDown => "one-time teardown",
        }
    }
}

impl fmt::Display for HookRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a method is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodRole {
    Test,
    Hook(HookRole),
}

trait ErasedStep: Send + Sync {
    fn call<'a>(&self, instance: &'a mut (dyn Any + Send), ctx: &'a TestContext) -> StepFuture<'a>;
}

struct TypedStep<F> {
    step: Step<F>,
}

impl<F: Send + 'static> ErasedStep for TypedStep<F> {
    fn call<'a>(&self, instance: &'a mut (dyn Any + Send), ctx: &'a TestContext) -> StepFuture<'a> {
        match instance.downcast_mut::<F>() {
            Some(fixture) => (self.step)(fixture, ctx),
            None => Box::pin(std::future::ready(Err(StepError::InstanceMismatch {
                expected: std::any::type_name::<F>(),
            }))),
        }
    }
}

#[derive(Clone)]
enum Signature {
    Invocable(Arc<dyn ErasedStep>),
    Parameterized(usize),
}

/// One recognized method of a fixture.
#[derive(Clone)]
pub struct MethodEntry {
    name: String,
    display_name: Option<String>,
    skip_reason: Option<String>,
    role: MethodRole,
    signature: Signature,
}

impl MethodEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    pub fn role(&self) -> MethodRole {
        self.role
    }

    pub fn is_test(&self) -> bool {
        self.role == MethodRole::Test
    }

    /// Number of parameters the runner would have to supply (zero when invocable).
    pub fn arity(&self) -> usize {
        match self.signature {
            Signature::Invocable(_) => 0,
            Signature::Parameterized(arity) => arity,
        }
    }

    pub fn is_invocable(&self) -> bool {
        matches!(self.signature, Signature::Invocable(_))
    }

    /// Start this step on `instance`. Nothing runs until the future is polled.
    pub fn invoke<'a>(&self, instance: &'a mut (dyn Any + Send), ctx: &'a TestContext) -> StepFuture<'a> {
        match &self.signature {
            Signature::Invocable(step) => step.call(instance, ctx),
            Signature::Parameterized(arity) => Box::pin(std::future::ready(Err(StepError::Parameterized {
                method: self.name.clone(),
                arity: *arity,
            }))),
        }
    }
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("skip_reason", &self.skip_reason)
            .field("role", &self.role)
            .field("arity", &self.arity())
            .finish()
    }
}

type Constructor = Arc<dyn Fn() -> FixtureInstance + Send + Sync>;

/// Runtime description of a fixture type.
#[derive(Clone)]
pub struct FixtureType {
    name: String,
    constructor: Constructor,
    methods: Vec<MethodEntry>,
}

impl FixtureType {
    /// Fully qualified type name, e.g. `calculator_demo::CalculatorTests`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last path segment of [`Self::name`].
    pub fn short_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }

    /// Every recognized method, in declaration order.
    pub fn methods(&self) -> &[MethodEntry] {
        &self.methods
    }

    pub fn tests(&self) -> impl Iterator<Item = (usize, &MethodEntry)> {
        self.methods.iter().enumerate().filter(|(_, method)| method.is_test())
    }

    /// Hooks declared for `role`, in declaration order.
    pub fn hooks(&self, role: HookRole) -> impl Iterator<Item = &MethodEntry> {
        self.methods
            .iter()
            .filter(move |method| method.role == MethodRole::Hook(role))
    }

    /// Build a fresh instance. Panics raised by the constructor propagate to the caller.
    pub fn construct(&self) -> FixtureInstance {
        (self.constructor)()
    }
}

impl fmt::Debug for FixtureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureType")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Builds a [`FixtureType`] for `F`.
pub struct FixtureBuilder<F> {
    name: String,
    constructor: Constructor,
    methods: Vec<MethodEntry>,
    _fixture: PhantomData<fn() -> F>,
}

impl<F: Default + Send + 'static> FixtureBuilder<F> {
    /// Start a fixture constructed with `F::default()`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_constructor(name, F::default)
    }
}

impl<F: Send + 'static> FixtureBuilder<F> {
    pub fn with_constructor(name: impl Into<String>, constructor: impl Fn() -> F + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            constructor: Arc::new(move || Box::new(constructor()) as FixtureInstance),
            methods: Vec::new(),
            _fixture: PhantomData,
        }
    }

    pub fn test(mut self, name: &str, display_name: Option<&str>, skip_reason: Option<&str>, step: Step<F>) -> Self {
        self.methods.push(MethodEntry {
            name: name.to_string(),
            display_name: display_name.map(str::to_string),
            skip_reason: skip_reason.map(str::to_string),
            role: MethodRole::Test,
            signature: Signature::Invocable(Arc::new(TypedStep { step })),
        });
        self
    }

    /// Record a test method that takes parameters. It is never discovered.
    pub fn parameterized_test(mut self, name: &str, arity: usize) -> Self {
        self.methods.push(MethodEntry {
            name: name.to_string(),
            display_name: None,
            skip_reason: None,
            role: MethodRole::Test,
            signature: Signature::Parameterized(arity),
        });
        self
    }

    pub fn hook(mut self, role: HookRole, name: &str, step: Step<F>) -> Self {
        self.methods.push(MethodEntry {
            name: name.to_string(),
            display_name: None,
            skip_reason: None,
            role: MethodRole::Hook(role),
            signature: Signature::Invocable(Arc::new(TypedStep { step })),
        });
        self
    }

    /// Record a hook that takes parameters. It fails when invoked.
    pub fn parameterized_hook(mut self, role: HookRole, name: &str, arity: usize) -> Self {
        self.methods.push(MethodEntry {
            name: name.to_string(),
            display_name: None,
            skip_reason: None,
            role: MethodRole::Hook(role),
            signature: Signature::Parameterized(arity),
        });
        self
    }

    pub fn build(self) -> FixtureType {
        FixtureType {
            name: self.name,
            constructor: self.constructor,
            methods: self.methods,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        hits: usize,
    }

    fn bump<'a>(counter: &'a mut Counter, _ctx: &'a TestContext) -> StepFuture<'a> {
        Box::pin(async move {
            counter.hits += 1;
            Ok(())
        })
    }

    fn counter_type() -> FixtureType {
        FixtureBuilder::<Counter>::new("demo::Counter")
            .hook(HookRole::SetUp, "first_setup", bump)
            .test("bumps", Some("Bumps the counter"), None, bump)
            .parameterized_test("with_args", 2)
            .hook(HookRole::SetUp, "second_setup", bump)
            .build()
    }

    #[test]
    fn test_methods_keep_declaration_order() {
        let fixture = counter_type();
        let names: Vec<_> = fixture.methods().iter().map(MethodEntry::name).collect();
        assert_eq!(names, ["first_setup", "bumps", "with_args", "second_setup"]);
        assert_eq!(fixture.short_name(), "Counter");

        let hooks: Vec<_> = fixture.hooks(HookRole::SetUp).map(MethodEntry::name).collect();
        assert_eq!(hooks, ["first_setup", "second_setup"]);
        assert_eq!(fixture.tests().count(), 2);
    }

    #[test]
    fn test_invoke_runs_against_instance() {
        let fixture = counter_type();
        let mut instance = fixture.construct();
        let ctx = TestContext::new(fixture.name());
        let entry = &fixture.methods()[1];
        futures::executor::block_on(entry.invoke(instance.as_mut(), &ctx)).unwrap();
        assert_eq!(instance.downcast_ref::<Counter>().unwrap().hits, 1);
    }

    #[test]
    fn test_parameterized_entry_fails_when_invoked() {
        let fixture = counter_type();
        let mut instance = fixture.construct();
        let ctx = TestContext::new(fixture.name());
        let entry = &fixture.methods()[2];
        assert!(!entry.is_invocable());
        assert_eq!(entry.arity(), 2);
        let err = futures::executor::block_on(entry.invoke(instance.as_mut(), &ctx)).unwrap_err();
        assert!(matches!(err, StepError::Parameterized { arity: 2, .. }));
    }

    #[test]
    fn test_wrong_instance_type_is_reported() {
        let fixture = counter_type();
        let mut wrong: FixtureInstance = Box::new(42_u8);
        let ctx = TestContext::new(fixture.name());
        let err = futures::executor::block_on(fixture.methods()[1].invoke(wrong.as_mut(), &ctx)).unwrap_err();
        assert!(matches!(err, StepError::InstanceMismatch { .. }));
    }

    #[test]
    fn test_result_conversion() {
        assert!(().into_step_result().is_ok());
        let err = Err::<(), _>("bad state").into_step_result().unwrap_err();
        assert_eq!(err.message(), "bad state");
    }
}
