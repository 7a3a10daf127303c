//! Property-based tests for `hookcheck_core`.
//!
//! These check expectation evaluation and path containment for arbitrary
//! inputs, without touching git.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use hookcheck_core::fixture::is_contained;
use hookcheck_core::prelude::*;
use proptest::prelude::*;

fn result(status: i32, stdout: &str, stderr: &str) -> ExecutionResult {
    ExecutionResult {
        status,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        duration: Duration::ZERO,
    }
}

fn observation(branch: Option<String>, commit_count: usize) -> RepositoryObservation {
    RepositoryObservation {
        branch,
        entries: Vec::new(),
        commit_count,
        files: BTreeMap::new(),
    }
}

proptest! {
    /// `exit_status == n` and `exit_status != n` never agree.
    #[test]
    fn exit_status_and_its_negation_are_exclusive(actual in any::<i32>(), declared in any::<i32>()) {
        let result = result(actual, "", "");
        let obs = observation(None, 0);

        let eq = Expectation::ExitStatus(declared).evaluate(&result, &obs).is_ok();
        let ne = Expectation::ExitStatusNot(declared).evaluate(&result, &obs).is_ok();

        prop_assert_ne!(eq, ne);
        prop_assert_eq!(eq, actual == declared);
    }

    /// A mismatch always reports the observed value.
    #[test]
    fn commit_count_mismatch_reports_actual(actual in 0usize..1000, declared in 0usize..1000) {
        prop_assume!(actual != declared);

        let mismatch = Expectation::CommitCount(declared)
            .evaluate(&result(0, "", ""), &observation(None, actual))
            .unwrap_err();

        prop_assert_eq!(mismatch.actual, actual.to_string());
        prop_assert_eq!(mismatch.expected, declared.to_string());
    }

    /// Any substring of captured output satisfies `stdout_contains`.
    #[test]
    fn stdout_contains_accepts_substrings(text in "\\PC{0,64}", start in 0usize..64, len in 0usize..64) {
        let chars: Vec<char> = text.chars().collect();
        let start = start.min(chars.len());
        let end = (start + len).min(chars.len());
        let needle: String = chars[start..end].iter().collect();

        let outcome = Expectation::StdoutContains(needle).evaluate(&result(0, &text, ""), &observation(None, 0));
        prop_assert!(outcome.is_ok());
    }

    /// A branch expectation only holds for exactly that branch.
    #[test]
    fn branch_matches_only_itself(actual in "[a-z][a-z0-9/_-]{0,20}", declared in "[a-z][a-z0-9/_-]{0,20}") {
        let obs = observation(Some(actual.clone()), 0);
        let holds = Expectation::Branch(declared.clone()).evaluate(&result(0, "", ""), &obs).is_ok();

        prop_assert_eq!(holds, actual == declared);
    }

    /// `evaluate_all` reports exactly the expectations whose `evaluate` fails.
    #[test]
    fn evaluate_all_agrees_with_evaluate(statuses in proptest::collection::vec(-3i32..3, 0..12), actual in -3i32..3) {
        let expectations: Vec<Expectation> = statuses.iter().copied().map(Expectation::ExitStatus).collect();
        let result = result(actual, "", "");
        let obs = observation(None, 0);

        let mismatches = hookcheck_core::expectation::evaluate_all(&expectations, &result, &obs);
        let failing = expectations.iter().filter(|e| e.evaluate(&result, &obs).is_err()).count();

        prop_assert_eq!(mismatches.len(), failing);
    }

    /// Paths that climb out with `..` are never contained.
    #[test]
    fn parent_segments_escape(prefix in "[a-z]{1,8}", depth in 1usize..4) {
        let climb = "../".repeat(depth + 1);
        let path = format!("{prefix}/{climb}outside");

        prop_assert!(!is_contained(Path::new(&path)));
    }

    /// Plain relative names are always contained.
    #[test]
    fn plain_names_are_contained(parts in proptest::collection::vec("[a-zA-Z0-9 _-]{1,12}", 1..4)) {
        prop_assume!(parts[0] != ".git");
        let path = parts.join("/");

        prop_assert!(is_contained(Path::new(&path)));
    }
}
