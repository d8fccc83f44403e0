//! Timer-interrupt trampoline.
//!
//! The machine model is registered once at startup; the hardware timer
//! vector then calls [`dispatch`] on every compare match. Keeping the
//! registration behind a critical section means the vector and the
//! foreground never race on the handler cell.

use core::cell::RefCell;

use critical_section::Mutex;

/// Implemented by the object that consumes timer ticks — in practice the
/// machine model, which steps the active segment or arms the next one.
pub trait TickHandler: Send {
    fn on_tick(&mut self);
}

static TICK_HANDLER: Mutex<RefCell<Option<&'static mut dyn TickHandler>>> =
    Mutex::new(RefCell::new(None));

/// Install the tick handler. Call once during startup, before the timer
/// interrupt is enabled.
pub fn register(handler: &'static mut dyn TickHandler) {
    critical_section::with(|cs| {
        TICK_HANDLER.borrow(cs).replace(Some(handler));
    });
}

/// The interrupt body: forward one tick to the registered handler. A tick
/// that arrives before registration is dropped.
pub fn dispatch() {
    critical_section::with(|cs| {
        if let Some(handler) = TICK_HANDLER.borrow_ref_mut(cs).as_mut() {
            handler.on_tick();
        }
    });
}
