use libc::{c_void, off_t, pread, pwrite};
use std::io;
use std::os::unix::io::RawFd;

/// Perform pread using raw file descriptor
///
/// Reads at `offset` without moving the file position. Returns the number of
/// bytes read, zero at end of file.
pub fn pread_fd(fd: RawFd, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    loop {
        let result = unsafe {
            pread(
                fd,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                offset as off_t,
            )
        };

        if result < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(result as usize);
    }
}

/// Write all of `buf` at `offset` using pwrite, retrying short writes.
pub fn pwrite_all_fd(fd: RawFd, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
        let result = unsafe {
            pwrite(
                fd,
                buf.as_ptr() as *const c_void,
                buf.len(),
                offset as off_t,
            )
        };

        if result < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if result == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "pwrite wrote zero bytes",
            ));
        }
        let written = result as usize;
        buf = &buf[written..];
        offset += written as u64;
    }
    Ok(())
}

/// Copy `len` bytes from `src` at `src_offset` to `dst` at `dst_offset`.
///
/// Uses `copy_file_range` so the kernel moves the bytes, falling back to a
/// pread/pwrite loop through `scratch` where that is unsupported.
pub fn copy_range_fd(
    src: RawFd,
    src_offset: u64,
    dst: RawFd,
    dst_offset: u64,
    len: u64,
    scratch: &mut Vec<u8>,
) -> io::Result<()> {
    let mut copied = kernel_copy(src, src_offset, dst, dst_offset, len)?;

    if copied < len && scratch.is_empty() {
        scratch.resize(64 * 1024, 0);
    }
    while copied < len {
        let want = ((len - copied) as usize).min(scratch.len());
        let read = pread_fd(src, &mut scratch[..want], src_offset + copied)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "source ended before the requested range was copied",
            ));
        }
        pwrite_all_fd(dst, &scratch[..read], dst_offset + copied)?;
        copied += read as u64;
    }

    Ok(())
}

/// Copy as much of the range as `copy_file_range` will move. Returns the
/// number of bytes copied before the syscall became unavailable.
#[cfg(target_os = "linux")]
fn kernel_copy(src: RawFd, src_offset: u64, dst: RawFd, dst_offset: u64, len: u64) -> io::Result<u64> {
    let mut copied = 0u64;
    while copied < len {
        let mut src_off = (src_offset + copied) as libc::loff_t;
        let mut dst_off = (dst_offset + copied) as libc::loff_t;
        let remaining = (len - copied) as usize;
        let result = unsafe {
            libc::copy_file_range(src, &mut src_off, dst, &mut dst_off, remaining, 0)
        };

        if result < 0 {
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::ENOSYS) | Some(libc::EXDEV) | Some(libc::EINVAL)
                | Some(libc::EOPNOTSUPP) => return Ok(copied),
                _ => return Err(err),
            }
        }
        if result == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "source ended before the requested range was copied",
            ));
        }
        copied += result as u64;
    }
    Ok(copied)
}

#[cfg(not(target_os = "linux"))]
fn kernel_copy(_src: RawFd, _src_offset: u64, _dst: RawFd, _dst_offset: u64, _len: u64) -> io::Result<u64> {
    Ok(0)
}
