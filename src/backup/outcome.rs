//! Accumulated result of a batch operation over many items.
//!
//! Per-item failures never abort a batch; they are collected next to the
//! successful items so callers can inspect both sides.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::fmt::Debug;

/// One item that failed, together with the reason.
#[derive(Debug)]
pub struct Failure<T> {
    pub item: T,
    pub error: Error,
}

#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<Failure<T>>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn push_ok(&mut self, item: T) {
        self.succeeded.push(item);
    }

    pub fn push_err<E: Into<Error>>(&mut self, item: T, error: E) {
        self.failed.push(Failure {
            item,
            error: error.into(),
        });
    }

    /// Records `res` on the matching side.
    pub fn record<R>(&mut self, item: T, res: Result<R>) {
        match res {
            Ok(_) => self.push_ok(item),
            Err(e) => self.push_err(item, e),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn failed_items(&self) -> impl Iterator<Item = &T> {
        self.failed.iter().map(|f| &f.item)
    }
}

impl<T: Debug> BatchOutcome<T> {
    /// Folds every failure into a single error, tagging each with its item.
    pub fn into_error(self) -> Option<Error> {
        if self.failed.is_empty() {
            return None;
        }
        Some(Error::from(
            self.failed
                .into_iter()
                .map(|f| Error::WithMsg {
                    msg: format!("{:?}", f.item),
                    error: Box::new(f.error),
                })
                .collect::<Vec<_>>(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_splits_by_result() {
        let mut outcome = BatchOutcome::default();
        outcome.record("a", Ok(()));
        outcome.record("b", Err::<(), _>(std::io::Error::other("locked").into()));
        outcome.record("c", Ok(3));

        assert_eq!(outcome.succeeded, vec!["a", "c"]);
        assert_eq!(outcome.failed_items().collect::<Vec<_>>(), vec![&"b"]);
        assert_eq!(outcome.attempted(), 3);
        assert!(!outcome.is_clean());
    }

    #[test]
    fn test_into_error_none_when_clean() {
        let mut outcome = BatchOutcome::default();
        outcome.push_ok(1);
        assert!(outcome.is_clean());
        assert!(outcome.into_error().is_none());
    }

    #[test]
    fn test_into_error_names_each_item() {
        let mut outcome: BatchOutcome<&str> = BatchOutcome::default();
        outcome.push_err("locked.txt", std::io::Error::other("denied"));
        outcome.push_err("gone.txt", std::io::Error::other("missing"));

        let msg = outcome.into_error().unwrap().to_string();
        assert!(msg.contains("\"locked.txt\""));
        assert!(msg.contains("denied"));
        assert!(msg.contains("\"gone.txt\""));
    }
}
