use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use hausbus_domain::error::HausbusError;

/// Run `body`, converting both an `Err` and a panic into an error message.
///
/// Used wherever user-supplied actions run so that one misbehaving action
/// never takes down the scheduler loop or the remaining listeners.
pub(crate) fn run_guarded<F>(body: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), HausbusError>,
{
    catch(body)?.map_err(|err| describe(&err))
}

/// Run `body`, turning a panic into its message.
pub(crate) fn catch<T, F>(body: F) -> Result<T, String>
where
    F: FnOnce() -> T,
{
    catch_unwind(AssertUnwindSafe(body)).map_err(|payload| panic_message(payload.as_ref()))
}

fn describe(err: &HausbusError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
