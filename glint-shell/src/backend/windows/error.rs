// Copyright 2019 the Glint Authors
// SPDX-License-Identifier: Apache-2.0

//! Win32 errors.

use std::fmt;

use winapi::shared::minwindef::DWORD;
use winapi::shared::winerror::HRESULT;
use winapi::um::errhandlingapi::GetLastError;

#[derive(Debug, Clone)]
pub enum Error {
    Hr(HRESULT),
    /// A Win32 call failed; the value is `GetLastError`.
    Win32 { call: &'static str, code: DWORD },
    /// A function is available on newer version of windows.
    OldWindows,
    /// The `hwnd` pointer was null.
    NullHwnd,
}

impl Error {
    /// Captures `GetLastError` for a failed `call`.
    pub(crate) fn last(call: &'static str) -> Error {
        Error::Win32 {
            call,
            code: unsafe { GetLastError() },
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match *self {
            Error::Hr(hr) => write!(f, "HRESULT 0x{hr:x}"),
            Error::Win32 { call, code } => write!(f, "{call} failed with error {code}"),
            Error::OldWindows => write!(f, "Attempted newer API on older Windows"),
            Error::NullHwnd => write!(f, "Window handle is Null"),
        }
    }
}

impl std::error::Error for Error {}

impl From<HRESULT> for Error {
    fn from(hr: HRESULT) -> Error {
        Error::Hr(hr)
    }
}

impl From<Error> for crate::error::Error {
    fn from(err: Error) -> crate::error::Error {
        crate::error::Error::Platform(err.into())
    }
}
