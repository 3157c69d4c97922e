// POSIX named shared-memory backend for cross-process queues.
// Uses shm_open + mmap so joiners can find the region by name.

use std::io;

use crate::queue::LfQueue;

/// A queue living in a named POSIX shared-memory object.
///
/// The creator formats the region ([`ShmQueue::create`]); any number of
/// cooperating processes map the same name and [`ShmQueue::attach`] to it.
/// Dropping the handle unmaps the region but leaves the name in place;
/// [`ShmQueue::unlink`] removes the name once every participant is done.
#[cfg(unix)]
#[derive(Debug)]
pub struct ShmQueue {
    queue: LfQueue,
    base: std::ptr::NonNull<u8>,
    mem_size: usize,
    name: std::ffi::CString,
}

#[cfg(unix)]
unsafe impl Send for ShmQueue {}
#[cfg(unix)]
unsafe impl Sync for ShmQueue {}

#[cfg(unix)]
impl ShmQueue {
    /// Create (or truncate) the named shared-memory object, size it to
    /// [`LfQueue::required_memory`], map it, and format a queue in it.
    pub fn create(name: &str, n_elements: usize, element_size: usize) -> io::Result<Self> {
        let c_name = shm_name(name)?;
        let mem_size = LfQueue::required_memory(n_elements, element_size);

        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR,
                (libc::S_IRUSR | libc::S_IWUSR) as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::ftruncate(fd, mem_size as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(err);
        }

        let base = match map_region(fd, mem_size) {
            Ok(base) => base,
            Err(e) => {
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
                return Err(e);
            }
        };
        let queue = match unsafe { LfQueue::mem_init(base.as_ptr(), n_elements, element_size) } {
            Ok(queue) => queue,
            Err(e) => {
                unsafe {
                    libc::munmap(base.as_ptr() as *mut libc::c_void, mem_size);
                    libc::shm_unlink(c_name.as_ptr());
                }
                return Err(e);
            }
        };

        Ok(Self {
            queue,
            base,
            mem_size,
            name: c_name,
        })
    }

    /// Map an already-created object and attach to the queue inside it.
    /// The caller's `n_elements` / `element_size` must match the creator's;
    /// a mismatch would make the two sides disagree on the region layout.
    pub fn attach(name: &str, n_elements: usize, element_size: usize) -> io::Result<Self> {
        let c_name = shm_name(name)?;
        let mem_size = LfQueue::required_memory(n_elements, element_size);

        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_RDWR,
                (libc::S_IRUSR | libc::S_IWUSR) as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let base = map_region(fd, mem_size)?;
        let queue = match unsafe { LfQueue::attach(base.as_ptr()) } {
            Ok(queue) => queue,
            Err(e) => {
                unsafe { libc::munmap(base.as_ptr() as *mut libc::c_void, mem_size) };
                return Err(e);
            }
        };

        if queue.capacity() != n_elements
            || queue.element_size() != crate::queue::layout::min_element_size(element_size)
        {
            let err = io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "queue \"{name}\" was created with {} slots of {} bytes, not {} of {}",
                    queue.capacity(),
                    queue.element_size(),
                    n_elements,
                    element_size,
                ),
            );
            unsafe { libc::munmap(base.as_ptr() as *mut libc::c_void, mem_size) };
            return Err(err);
        }

        Ok(Self {
            queue,
            base,
            mem_size,
            name: c_name,
        })
    }

    /// The queue inside the mapping.
    pub fn queue(&self) -> &LfQueue {
        &self.queue
    }

    /// Size of the mapped region in bytes.
    pub fn size(&self) -> usize {
        self.mem_size
    }

    /// Remove the shared-memory name. Existing mappings stay valid until
    /// every process unmaps.
    pub fn unlink(&self) -> io::Result<()> {
        if unsafe { libc::shm_unlink(self.name.as_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(unix)]
impl Drop for ShmQueue {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.mem_size);
        }
    }
}

#[cfg(unix)]
fn shm_name(name: &str) -> io::Result<std::ffi::CString> {
    std::ffi::CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "shm name contains NUL"))
}

/// mmap the object and close the fd; the mapping keeps the object alive.
#[cfg(unix)]
fn map_region(fd: libc::c_int, mem_size: usize) -> io::Result<std::ptr::NonNull<u8>> {
    let base = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            mem_size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    unsafe { libc::close(fd) };
    if base == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    std::ptr::NonNull::new(base as *mut u8)
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))
}

#[cfg(not(unix))]
#[derive(Debug)]
pub struct ShmQueue {
    queue: LfQueue,
}

#[cfg(not(unix))]
impl ShmQueue {
    pub fn create(_name: &str, _n_elements: usize, _element_size: usize) -> io::Result<Self> {
        Err(unsupported())
    }

    pub fn attach(_name: &str, _n_elements: usize, _element_size: usize) -> io::Result<Self> {
        Err(unsupported())
    }

    pub fn queue(&self) -> &LfQueue {
        &self.queue
    }

    pub fn size(&self) -> usize {
        0
    }

    pub fn unlink(&self) -> io::Result<()> {
        Err(unsupported())
    }
}

#[cfg(not(unix))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "named shared memory requires a POSIX platform",
    )
}
