//! "First success" combinators over an ordered list of strategies.
//!
//! Used wherever several storage shapes or query forms may hold the data and
//! the first one that works should win.

use std::fmt::Display;
use std::future::Future;

/// Outcome of running a strategy chain.
#[derive(Debug)]
pub struct Attempted<T, E> {
    /// `(strategy index, value)` of the winner, if any.
    pub winner: Option<(usize, T)>,
    /// Errors raised by the strategies tried before the winner (or all of them).
    pub errors: Vec<(usize, E)>,
}

impl<T, E> Attempted<T, E> {
    pub fn value(self) -> Option<T> {
        self.winner.map(|(_, v)| v)
    }
}

/// Runs `strategies` in order and returns the first value that is `Ok` and
/// passes `accept`. Errors and rejected values fall through to the next one.
pub async fn first_success<T, E, F, Fut>(
    strategies: impl IntoIterator<Item = F>,
    accept: impl Fn(&T) -> bool,
) -> Attempted<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut errors = Vec::new();

    for (idx, strategy) in strategies.into_iter().enumerate() {
        match strategy().await {
            Ok(value) if accept(&value) => {
                return Attempted {
                    winner: Some((idx, value)),
                    errors,
                };
            }
            Ok(_) => continue,
            Err(e) => errors.push((idx, e)),
        }
    }

    Attempted {
        winner: None,
        errors,
    }
}

/// Joins strategy errors into one line for logs and error messages.
pub fn describe_errors<E: Display>(errors: &[(usize, E)]) -> String {
    errors
        .iter()
        .map(|(idx, e)| format!("#{idx}: {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    type Strategy = Box<dyn FnOnce() -> std::future::Ready<Result<u32, String>>>;

    fn ok(v: u32) -> Strategy {
        Box::new(move || std::future::ready(Ok(v)))
    }

    fn fail(msg: &str) -> Strategy {
        let msg = msg.to_string();
        Box::new(move || std::future::ready(Err(msg)))
    }

    #[tokio::test]
    async fn test_first_ok_wins() {
        let result = first_success(vec![fail("boom"), ok(7), ok(9)], |_: &u32| true).await;
        assert_eq!(result.winner, Some((1, 7)));
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_value_falls_through() {
        let result = first_success(vec![ok(0), ok(3)], |v: &u32| *v > 0).await;
        assert_eq!(result.winner, Some((1, 3)));
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_all_fail() {
        let result = first_success(vec![fail("a"), fail("b")], |_: &u32| true).await;
        assert!(result.winner.is_none());
        assert_eq!(describe_errors(&result.errors), "#0: a; #1: b");
    }

    #[tokio::test]
    async fn test_strategies_after_winner_are_not_run() {
        let result = first_success(
            vec![ok(1), Box::new(|| -> std::future::Ready<Result<u32, String>> {
                panic!("must not run")
            }) as Strategy],
            |_: &u32| true,
        )
        .await;
        assert_eq!(result.value(), Some(1));
    }
}
