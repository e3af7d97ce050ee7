//! Name filter applied before execution (`-k`).

use crate::model::TestCase;

/// Case-insensitive substring match over the fully qualified or display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFilter {
    needle: Option<String>,
}

impl TestFilter {
    /// An empty or absent expression matches everything.
    pub fn new(expr: Option<&str>) -> Self {
        let needle = expr
            .map(str::trim)
            .filter(|expr| !expr.is_empty())
            .map(str::to_lowercase);
        Self { needle }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_none()
    }

    pub fn matches(&self, case: &TestCase) -> bool {
        self.matches_names(case.fully_qualified_name(), case.display_name())
    }

    pub fn matches_names(&self, fully_qualified_name: &str, display_name: &str) -> bool {
        match &self.needle {
            None => true,
            Some(needle) => {
                fully_qualified_name.to_lowercase().contains(needle.as_str())
                    || display_name.to_lowercase().contains(needle.as_str())
            }
        }
    }

    /// Keep the matching cases, in order.
    pub fn apply(&self, cases: Vec<TestCase>) -> Vec<TestCase> {
        if self.is_empty() {
            return cases;
        }
        cases.into_iter().filter(|case| self.matches(case)).collect()
    }
}
