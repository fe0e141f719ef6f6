// SPDX-License-Identifier: MPL-2.0

#![allow(dead_code)]

use std::fmt;

/// Error number, restricted to the subset this line discipline can raise.
///
/// See spec.md §7 for the mapping from condition to errno.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Errno {
    EINTR = 4,  /* Interrupted system call (CANCEL) */
    EIO = 5,    /* Reader/writer slot already busy */
    ENXIO = 6,  /* No such device (bad minor / no devread) */
    EAGAIN = 11, /* Would block (non-blocking read/write with no progress) */
    EFAULT = 14, /* Caller's address could not be mapped */
    EACCES = 13, /* Permission denied (log device opened for read) */
    EINVAL = 22, /* Invalid argument (bad count, unknown ioctl) */
    ENOTTY = 25, /* Not a typewriter (job control unsupported) */
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error used throughout this crate.
#[derive(Debug, Clone, Copy)]
pub struct Error {
    errno: Errno,
    msg: Option<&'static str>,
}

impl Error {
    pub const fn new(errno: Errno) -> Self {
        Error { errno, msg: None }
    }

    pub const fn with_message(errno: Errno, msg: &'static str) -> Self {
        Error {
            errno,
            msg: Some(msg),
        }
    }

    pub const fn error(&self) -> Errno {
        self.errno
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.msg {
            Some(msg) => write!(f, "{}: {}", self.errno, msg),
            None => write!(f, "{}", self.errno),
        }
    }
}

impl std::error::Error for Error {}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        Error::new(errno)
    }
}

impl AsRef<Error> for Error {
    fn as_ref(&self) -> &Error {
        self
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! return_errno {
    ($errno:expr) => {
        return Err($crate::error::Error::new($errno))
    };
}

#[macro_export]
macro_rules! return_errno_with_message {
    ($errno:expr, $message:expr) => {
        return Err($crate::error::Error::with_message($errno, $message))
    };
}
