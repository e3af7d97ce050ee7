//! Calculator demo harness.
//!
//! `cargo run --bin calculator-demo -- -v` runs the fixtures below through the MiniUnit CLI.

use miniunit::prelude::*;

#[derive(Debug, Default)]
struct Calculator {
    memory: i64,
}

impl Calculator {
    fn add(&mut self, a: i64, b: i64) -> i64 {
        self.memory = a + b;
        self.memory
    }

    fn divide(&mut self, a: i64, b: i64) -> i64 {
        tracing::info!(a, b, "dividing");
        self.memory = a / b;
        self.memory
    }
}

#[derive(Default)]
struct CalculatorTests {
    calc: Calculator,
}

#[fixture]
impl CalculatorTests {
    #[one_time_setup]
    fn init(&mut self, ctx: &TestContext) {
        ctx.write_line("init");
    }

    #[setup]
    fn set_up(&mut self) {
        self.calc = Calculator::default();
    }

    #[test(name = "Addition works")]
    fn add_works(&mut self, ctx: &TestContext) {
        ctx.write_line("adding 2 and 3");
        assert_eq(5, self.calc.add(2, 3));
    }

    #[test]
    fn divide_by_zero_raises(&mut self) {
        let calc = &mut self.calc;
        let failure = throws(FailureKind::DivideByZero, || calc.divide(1, 0));
        assert_true(failure.message().contains("divide by zero"));
    }

    #[test]
    async fn memory_survives_await(&mut self) {
        self.calc.add(40, 2);
        tokio::task::yield_now().await;
        assert_eq(42, self.calc.memory);
    }

    #[test(skip = "rounding mode is not implemented")]
    fn rounds_half_even(&mut self) {
        assert_eq(2, self.calc.divide(5, 2));
    }

    #[teardown]
    fn tear_down(&mut self) {}

    #[one_time_teardown]
    fn finish(&mut self) {}
}

fn main() {
    miniunit::cli::run();
}
