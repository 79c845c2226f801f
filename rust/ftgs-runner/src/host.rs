//! Adapters for resources owned by the host process.
//!
//! The host opens the output sockets and maps shard files before a run.
//! The core writes to those sockets and reads those mappings but never closes
//! or unmaps them. Host mappings are registered with
//! [`MapCache::insert_host_mapping`](ftgs_shard::map_cache::MapCache::insert_host_mapping).

#[cfg(unix)]
pub use self::unix::HostSocket;

#[cfg(unix)]
mod unix {
    use std::{
        fs::File,
        io::{self, Write},
        mem::ManuallyDrop,
        os::fd::{FromRawFd, RawFd},
    };

    /// An output socket borrowed from the host by its file descriptor.
    ///
    /// Dropping a `HostSocket` leaves the descriptor open.
    pub struct HostSocket {
        file: ManuallyDrop<File>,
        fd: RawFd,
    }

    impl HostSocket {
        /// # Safety
        ///
        /// `fd` must be an open descriptor that stays open, and is not written
        /// by anyone else, for the lifetime of the returned socket.
        pub unsafe fn from_raw_fd(fd: RawFd) -> HostSocket {
            HostSocket {
                // SAFETY: guaranteed by the caller; `ManuallyDrop` keeps the
                // descriptor from being closed.
                file: ManuallyDrop::new(unsafe { File::from_raw_fd(fd) }),
                fd,
            }
        }

        pub fn fd(&self) -> RawFd {
            self.fd
        }
    }

    impl Write for HostSocket {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.file.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    impl std::fmt::Debug for HostSocket {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("HostSocket").field("fd", &self.fd).finish()
        }
    }

    #[cfg(test)]
    mod tests {
        use std::{
            io::{Read, Seek, SeekFrom},
            os::fd::AsRawFd,
        };

        use super::*;

        #[test]
        fn test_write_leaves_descriptor_open() {
            let mut file = tempfile::tempfile().unwrap();
            {
                let mut socket = unsafe { HostSocket::from_raw_fd(file.as_raw_fd()) };
                assert_eq!(socket.fd(), file.as_raw_fd());
                socket.write_all(b"ftgs").unwrap();
                socket.flush().unwrap();
            }
            file.seek(SeekFrom::Start(0)).unwrap();
            let mut contents = String::new();
            file.read_to_string(&mut contents).unwrap();
            assert_eq!(contents, "ftgs");
        }
    }
}
