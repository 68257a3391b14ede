use std::thread::{self, ThreadId};

/// Tracks which thread an object is bound to.
///
/// Starts detached and binds to the first thread that checks it, so an object
/// can be built on one thread and handed to its owner before first use.
#[derive(Debug, Default)]
pub struct SequenceChecker {
    owner: Option<ThreadId>,
}

impl SequenceChecker {
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn called_on_valid_sequence(&mut self) -> bool {
        let current = thread::current().id();
        match self.owner {
            Some(owner) => owner == current,
            None => {
                self.owner = Some(current);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binds_to_first_caller() {
        let mut checker = SequenceChecker::detached();
        assert!(checker.called_on_valid_sequence());

        let valid_elsewhere = thread::spawn(move || checker.called_on_valid_sequence())
            .join()
            .unwrap();
        assert!(!valid_elsewhere);

        let mut fresh = SequenceChecker::detached();
        let valid_in_thread = thread::spawn(move || fresh.called_on_valid_sequence())
            .join()
            .unwrap();
        assert!(valid_in_thread);
    }
}
