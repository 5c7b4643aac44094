//! FFI bindings for moodtrace
//!
//! C-compatible functions so a non-Rust host (a browser shell, a WebView
//! bridge) can drive a session engine from its own event loop. The host owns
//! the timers: it calls `moodtrace_engine_tick` on its estimation cadence and
//! `moodtrace_engine_idle_window` when its debounce fires.
//!
//! All functions use C strings (null-terminated) and return allocated memory
//! that must be freed by the caller using `moodtrace_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::Utc;

use crate::config::EngineConfig;
use crate::engine::{MoodEngine, Signal};
use crate::error::SessionError;
use crate::types::BehaviorEvent;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Borrow the engine behind a handle, recording the lifecycle error on NULL
unsafe fn engine_mut<'a>(engine: *mut MoodEngineHandle) -> Option<&'a mut MoodEngine> {
    if engine.is_null() {
        set_last_error(&SessionError::Uninitialized.to_string());
        return None;
    }
    Some(&mut (*engine).engine)
}

fn json_or_null<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Engine Lifecycle
// ============================================================================

/// Opaque handle to a session engine
pub struct MoodEngineHandle {
    engine: MoodEngine,
}

/// Create a session engine.
///
/// # Safety
/// - `config_json` may be NULL (defaults are used) or a valid null-terminated
///   C string holding an `EngineConfig` JSON object.
/// - Must be freed with `moodtrace_engine_free`.
/// - Returns NULL on error; call `moodtrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_engine_new(config_json: *const c_char) -> *mut MoodEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        Ok(EngineConfig::default())
    } else {
        match cstr_to_string(config_json) {
            Some(json) => EngineConfig::from_json(&json),
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        }
    };

    match config.and_then(MoodEngine::new) {
        Ok(engine) => Box::into_raw(Box::new(MoodEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `moodtrace_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_engine_free(engine: *mut MoodEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

// ============================================================================
// Inbound Signals
// ============================================================================

/// Record a behavior event given as JSON (`{"type", "value", "timestamp", "domain"}`).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `moodtrace_engine_new`.
/// - `event_json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error; call `moodtrace_last_error` for details.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_engine_track_event(
    engine: *mut MoodEngineHandle,
    event_json: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return -1;
    };

    let json_str = match cstr_to_string(event_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event string pointer");
            return -1;
        }
    };

    match serde_json::from_str::<BehaviorEvent>(&json_str) {
        Ok(event) => {
            engine.track_event(event, Utc::now());
            0
        }
        Err(e) => {
            set_last_error(&SessionError::JsonError(e).to_string());
            -1
        }
    }
}

/// Feed a scroll offset sample taken now. Pass NaN when the position could
/// not be read.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `moodtrace_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_engine_scroll(engine: *mut MoodEngineHandle, offset: f64) -> i32 {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return -1;
    };
    engine.apply_signal(Signal::Scroll {
        offset: Some(offset).filter(|o| o.is_finite()),
        at: Utc::now(),
    });
    0
}

/// Report that the host's idle debounce window elapsed.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `moodtrace_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_engine_idle_window(engine: *mut MoodEngineHandle) -> i32 {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return -1;
    };
    engine.apply_signal(Signal::IdleWindow { at: Utc::now() });
    0
}

/// Report a page visibility transition (non-zero `hidden` means hidden).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `moodtrace_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_engine_visibility(
    engine: *mut MoodEngineHandle,
    hidden: i32,
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return -1;
    };
    engine.apply_signal(Signal::Visibility {
        hidden: hidden != 0,
        at: Utc::now(),
    });
    0
}

// ============================================================================
// Estimation and Reads
// ============================================================================

/// Recompute the mood and return it as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `moodtrace_engine_new`.
/// - Returns a newly allocated string that must be freed with `moodtrace_free_string`.
/// - Returns NULL on error; call `moodtrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_engine_tick(engine: *mut MoodEngineHandle) -> *mut c_char {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return ptr::null_mut();
    };
    let mood = engine.tick().clone();
    json_or_null(&mood)
}

/// Ranked `[{"domain", "mood"}]` list as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `moodtrace_engine_new`.
/// - Returns a newly allocated string that must be freed with `moodtrace_free_string`.
/// - Returns NULL on error; call `moodtrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_engine_site_influence(
    engine: *mut MoodEngineHandle,
) -> *mut c_char {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return ptr::null_mut();
    };
    json_or_null(&engine.site_influence())
}

/// Reset the event log, site table and metrics.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `moodtrace_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_engine_clear(engine: *mut MoodEngineHandle) -> i32 {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return -1;
    };
    engine.clear_data(Utc::now());
    0
}

/// Export dump as pretty JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `moodtrace_engine_new`.
/// - Returns a newly allocated string that must be freed with `moodtrace_free_string`.
/// - Returns NULL on error; call `moodtrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_engine_export(engine: *mut MoodEngineHandle) -> *mut c_char {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return ptr::null_mut();
    };
    match engine.export_data(Utc::now()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by moodtrace functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a moodtrace function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next moodtrace call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn moodtrace_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
