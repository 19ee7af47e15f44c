use std::any::Any;

use tokio::task::JoinError;

/// Renders a panic payload as text.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&'static str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"non-string panic payload".to_string()
	}
}

/// Extracts the panic message from a failed join, or `None` for cancellation.
pub(crate) fn join_error_panic_message(err: JoinError) -> Option<String> {
	if err.is_panic() {
		let payload = err.into_panic();
		Some(panic_message(payload.as_ref()))
	} else {
		None
	}
}

#[cfg(test)]
#[path = "panic_tests.rs"]
mod tests;
