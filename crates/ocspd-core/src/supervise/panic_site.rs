//! Panic site capture.
//!
//! `catch_unwind` only hands back the payload; by then the stack has been
//! unwound. A chained panic hook records the backtrace and location on the
//! panicking thread first, and the boundary picks them up right after the
//! unwind on that same thread.

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic;
use std::sync::Once;

use crate::domain::PanicSite;

static INSTALL: Once = Once::new();

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

/// Install the recording hook in front of whatever hook is already set.
/// Idempotent.
pub(crate) fn install() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let site = PanicSite {
                location: info.location().map(|l| l.to_string()),
                backtrace: Backtrace::force_capture(),
            };
            let _ = LAST_PANIC.try_with(|slot| *slot.borrow_mut() = Some(site));
            previous(info);
        }));
    });
}

/// Take the site recorded for the most recent panic on this thread.
pub(crate) fn take() -> Option<PanicSite> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}
