//! Capture of panics escaping worker functions.

use std::any::Any;

/// The payload carried by an unwinding panic.
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Error returned when joining a [`Worker`](crate::worker::Worker) whose
/// function panicked.
///
/// The crate performs no supervision or restart: the panic simply surfaces
/// here when the worker is joined. The original payload is preserved so the
/// caller can inspect it or [`resume`](Panic::resume) unwinding.
#[derive(thiserror::Error, Debug)]
#[error("worker panicked: {}", message(.payload).unwrap_or("opaque payload"))]
pub struct Panic {
    payload: PanicPayload,
}

impl Panic {
    pub(crate) fn new(payload: PanicPayload) -> Self {
        Panic { payload }
    }

    /// Returns the panic message, if the payload was a string.
    pub fn message(&self) -> Option<&str> {
        message(&self.payload)
    }

    /// Returns the raw payload of the panic.
    pub fn payload(&self) -> &PanicPayload {
        &self.payload
    }

    /// Consumes this `Panic` and resumes unwinding on the current thread.
    pub fn resume(self) -> ! {
        std::panic::resume_unwind(self.payload)
    }
}

fn message(payload: &PanicPayload) -> Option<&str> {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::Panic;

    fn catch(msg: &'static str) -> Panic {
        let payload = std::panic::catch_unwind(|| panic!("{}", msg)).unwrap_err();
        Panic::new(payload)
    }

    #[test]
    fn test_message() {
        let panic = catch("boom");
        assert_eq!(Some("boom"), panic.message());
        assert_eq!("worker panicked: boom", panic.to_string());
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn test_resume() {
        catch("boom").resume();
    }
}
