//! Work submission to the AppKit main thread
//!
//! AppKit and the Text Input Sources API must only be used from the main
//! thread. The cooperative context never waits for the result: closures
//! are queued on the main dispatch queue and run in submission order.

use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

#[repr(C)]
struct DispatchQueue {
    _private: [u8; 0],
}

extern "C" {
    static _dispatch_main_q: DispatchQueue;

    fn dispatch_async_f(
        queue: *const DispatchQueue,
        context: *mut c_void,
        work: extern "C" fn(*mut c_void),
    );
}

type Job = Box<dyn FnOnce() + Send>;

/// Queue `job` on the main thread and return immediately
pub fn run_on_main<F>(job: F)
where
    F: FnOnce() + Send + 'static,
{
    let job: Box<Job> = Box::new(Box::new(job));
    let context = Box::into_raw(job) as *mut c_void;
    unsafe {
        dispatch_async_f(&_dispatch_main_q, context, run_job);
    }
}

extern "C" fn run_job(context: *mut c_void) {
    // SAFETY: `context` came from `Box::into_raw` in `run_on_main` and is
    // handed to exactly one invocation.
    let job = unsafe { Box::from_raw(context as *mut Job) };
    if catch_unwind(AssertUnwindSafe(move || job())).is_err() {
        error!("main thread job panicked");
    }
}
