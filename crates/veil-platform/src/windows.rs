//! Windows capture exclusion via `SetWindowDisplayAffinity`.
//!
//! `WDA_EXCLUDEFROMCAPTURE` needs Windows 10 2004 or later; older builds
//! refuse the call and the manager reports `ExclusionFailed`.

use std::ffi::{c_void, OsStr};
use std::os::windows::ffi::OsStrExt;

use veil_core::{CaptureExclusion, WindowHandle};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    FindWindowW, SetWindowDisplayAffinity, WDA_EXCLUDEFROMCAPTURE, WDA_NONE,
};

#[derive(Debug, Default)]
pub struct Win32Exclusion;

impl Win32Exclusion {
    pub fn new() -> Self {
        Self
    }
}

fn wide(text: &str) -> Vec<u16> {
    OsStr::new(text).encode_wide().chain(Some(0)).collect()
}

fn hwnd(window: WindowHandle) -> *mut c_void {
    window.0 as *mut c_void
}

impl CaptureExclusion for Win32Exclusion {
    fn find_window_by_title(&self, title: &str) -> Option<WindowHandle> {
        let title = wide(title);
        let found = unsafe { FindWindowW(std::ptr::null(), title.as_ptr()) };
        if found.is_null() {
            None
        } else {
            Some(WindowHandle(found as isize))
        }
    }

    fn set_excluded(&mut self, window: WindowHandle) -> bool {
        unsafe { SetWindowDisplayAffinity(hwnd(window), WDA_EXCLUDEFROMCAPTURE) != 0 }
    }

    fn clear_excluded(&mut self, window: WindowHandle) -> bool {
        unsafe { SetWindowDisplayAffinity(hwnd(window), WDA_NONE) != 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_strings_are_nul_terminated() {
        assert_eq!(wide("Veil"), vec![86, 101, 105, 108, 0]);
    }
}
