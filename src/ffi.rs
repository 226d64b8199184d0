//! C-callable read adapters.
//!
//! Callback driven decoders hand out an opaque stream pointer and expect a
//! `(data, ptr, size, nmemb) -> int` function that reads through it. Each
//! per-kind adapter assumes `data` points at that exact stream type; passing
//! any other type is undefined behaviour. [`rawstream_read_datastream`] takes
//! an [`AnyDatastream`] instead and dispatches on its tag, so callers holding
//! the tagged stream never have to know the concrete kind.
//!
//! The result of the underlying `read_elements` is returned verbatim. The
//! only values produced here are `-1` for a null handle, a null destination
//! with a non-empty request, or a `size * nmemb` overflow.
//!
//! The destination may be uninitialized. It is zeroed before the read, so any
//! bytes the stream did not produce come back as 0.

use crate::stream::{
    AnyDatastream, BigfileDatastream, BufferDatastream, Datastream, DatastreamKind,
    FileDatastream, Whence,
};
use libc::{c_int, c_void, size_t};
use std::slice;
use tracing::*;

pub type ReadCallback =
    unsafe extern "C" fn(data: *mut c_void, ptr: *mut c_void, size: size_t, nmemb: size_t) -> c_int;

impl DatastreamKind {
    /// The adapter that reads through a pointer to this kind of stream.
    pub fn read_callback(&self) -> ReadCallback {
        match self {
            DatastreamKind::File => rawstream_read_file_datastream,
            DatastreamKind::BigFile => rawstream_read_bigfile_datastream,
            DatastreamKind::Buffer => rawstream_read_buffer_datastream,
        }
    }
}

/// # Safety
///
/// `data` must be null or point to a live, exclusively borrowed `S`. `ptr`
/// must be null or valid for writes of `size * nmemb` bytes. Those bytes need
/// not be initialized.
unsafe fn forward_read<S: Datastream>(
    data: *mut c_void,
    ptr: *mut c_void,
    size: size_t,
    nmemb: size_t,
) -> c_int {
    // SAFETY: the caller guarantees `data` is null or a valid `S`.
    let Some(stream) = (unsafe { data.cast::<S>().as_mut() }) else {
        error!("Read through a null datastream handle");
        return -1;
    };
    let Some(len) = size.checked_mul(nmemb) else {
        warn!("Read of {nmemb} x {size} bytes overflows");
        return -1;
    };
    if len == 0 {
        return 0;
    }
    if ptr.is_null() {
        error!("Read of {len} bytes into a null buffer");
        return -1;
    }
    let ptr = ptr.cast::<u8>();
    // SAFETY: the caller guarantees `ptr` is valid for `len` bytes of writes.
    // Zeroing first means the slice only covers initialized memory.
    let buf = unsafe {
        ptr.write_bytes(0, len);
        slice::from_raw_parts_mut(ptr, len)
    };
    stream.read_elements(buf, size)
}

/// # Safety
///
/// `data` must point to a [`FileDatastream`] and `ptr` must be valid for
/// writes of `size * nmemb` bytes.
#[no_mangle]
pub unsafe extern "C" fn rawstream_read_file_datastream(
    data: *mut c_void,
    ptr: *mut c_void,
    size: size_t,
    nmemb: size_t,
) -> c_int {
    // SAFETY: forwarded caller contract.
    unsafe { forward_read::<FileDatastream>(data, ptr, size, nmemb) }
}

/// # Safety
///
/// `data` must point to a [`BigfileDatastream`] and `ptr` must be valid for
/// writes of `size * nmemb` bytes.
#[no_mangle]
pub unsafe extern "C" fn rawstream_read_bigfile_datastream(
    data: *mut c_void,
    ptr: *mut c_void,
    size: size_t,
    nmemb: size_t,
) -> c_int {
    // SAFETY: forwarded caller contract.
    unsafe { forward_read::<BigfileDatastream>(data, ptr, size, nmemb) }
}

/// # Safety
///
/// `data` must point to a [`BufferDatastream`] and `ptr` must be valid for
/// writes of `size * nmemb` bytes.
#[no_mangle]
pub unsafe extern "C" fn rawstream_read_buffer_datastream(
    data: *mut c_void,
    ptr: *mut c_void,
    size: size_t,
    nmemb: size_t,
) -> c_int {
    // SAFETY: forwarded caller contract.
    unsafe { forward_read::<BufferDatastream<'_>>(data, ptr, size, nmemb) }
}

/// Tagged read: `data` is an [`AnyDatastream`] of any kind.
///
/// # Safety
///
/// `data` must point to an [`AnyDatastream`] and `ptr` must be valid for
/// writes of `size * nmemb` bytes.
#[no_mangle]
pub unsafe extern "C" fn rawstream_read_datastream(
    data: *mut c_void,
    ptr: *mut c_void,
    size: size_t,
    nmemb: size_t,
) -> c_int {
    // SAFETY: forwarded caller contract.
    unsafe { forward_read::<AnyDatastream<'_>>(data, ptr, size, nmemb) }
}

/// Returns 0 on success, -1 for a null handle, an unknown `whence` or a
/// failed seek.
///
/// # Safety
///
/// `data` must be null or point to an [`AnyDatastream`].
#[no_mangle]
pub unsafe extern "C" fn rawstream_seek_datastream(
    data: *mut c_void,
    offset: i64,
    whence: c_int,
) -> c_int {
    // SAFETY: the caller guarantees `data` is null or a valid stream.
    let Some(stream) = (unsafe { data.cast::<AnyDatastream<'_>>().as_mut() }) else {
        error!("Seek through a null datastream handle");
        return -1;
    };
    match Whence::try_from(whence) {
        Ok(whence) => stream.seek_whence(offset, whence),
        Err(_) => {
            warn!("Unknown seek origin {whence}");
            -1
        }
    }
}

/// # Safety
///
/// `data` must be null or point to an [`AnyDatastream`].
#[no_mangle]
pub unsafe extern "C" fn rawstream_tell_datastream(data: *mut c_void) -> i64 {
    // SAFETY: the caller guarantees `data` is null or a valid stream.
    match unsafe { data.cast::<AnyDatastream<'_>>().as_mut() } {
        Some(stream) => stream.tell(),
        None => -1,
    }
}

/// 1 at end of input, 0 otherwise, -1 for a null handle.
///
/// # Safety
///
/// `data` must be null or point to an [`AnyDatastream`].
#[no_mangle]
pub unsafe extern "C" fn rawstream_eof_datastream(data: *mut c_void) -> c_int {
    // SAFETY: the caller guarantees `data` is null or a valid stream.
    match unsafe { data.cast::<AnyDatastream<'_>>().as_mut() } {
        Some(stream) => c_int::from(stream.eof()),
        None => -1,
    }
}
