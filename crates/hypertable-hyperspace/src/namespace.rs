//! The on-disk namespace store.
//!
//! Namespace entries are backed by a local directory tree under a configured
//! base directory. Node metadata — lock generations and user attributes —
//! lives in extended attributes on the backing inodes. At startup the base
//! directory is exclusively flocked (the single-master guard: a second
//! master fails fast instead of blocking) and its `generation` attribute is
//! incremented and persisted.
//!
//! Attribute names are mapped into the `user.` namespace so the service can
//! run unprivileged; callers keep using the bare names (`generation`,
//! `lock.generation`, and anything user-set).

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::types::{HyperspaceError, HyperspaceResult, OpenFlags};

/// Normalizes a namespace name: requires a leading `/`, strips a single
/// trailing `/`, and rejects empty or NUL-bearing names.
pub fn normalize_name(name: &str) -> HyperspaceResult<String> {
    if name.is_empty() || !name.starts_with('/') || name.contains('\0') {
        return Err(HyperspaceError::BadPathname(name.to_string()));
    }
    let trimmed = if name.len() > 1 && name.ends_with('/') {
        &name[..name.len() - 1]
    } else {
        name
    };
    if trimmed == "/" {
        return Err(HyperspaceError::BadPathname(name.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Filesystem backing for the namespace.
pub struct NamespaceStore {
    base_dir: PathBuf,
    /// Holds the advisory lock for the life of the store.
    base_file: File,
    generation: u32,
}

impl NamespaceStore {
    /// Opens the base directory, takes the exclusive advisory lock, and
    /// bumps the `generation` attribute. Fails with `BaseDirLocked` if
    /// another master holds the directory.
    pub fn open(base_dir: &Path) -> HyperspaceResult<Self> {
        let base_file = File::open(base_dir)
            .map_err(|e| HyperspaceError::from_io(e, &base_dir.to_string_lossy()))?;

        let rc = unsafe { libc::flock(base_file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            return if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                Err(HyperspaceError::BaseDirLocked(
                    base_dir.to_string_lossy().into_owned(),
                ))
            } else {
                Err(err.into())
            };
        }

        let generation = match Self::get_xattr(&base_file, "generation")? {
            Some(bytes) => {
                let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    HyperspaceError::ProtocolError(format!(
                        "generation attribute has {} bytes, expected 4",
                        bytes.len()
                    ))
                })?;
                u32::from_le_bytes(raw) + 1
            }
            None => 1,
        };
        Self::set_xattr(&base_file, "generation", &generation.to_le_bytes())?;

        info!(dir = %base_dir.display(), generation, "opened hyperspace base directory");
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            base_file,
            generation,
        })
    }

    /// The store's generation, bumped once per startup.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The configured base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Maps a normalized namespace name to its backing path.
    pub fn abs_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(&name[1..])
    }

    /// True if the name is backed by an inode.
    pub fn exists(&self, name: &str) -> bool {
        self.abs_path(name).symlink_metadata().is_ok()
    }

    /// Whether the backing inode is a directory; `None` if it is absent.
    pub fn stat_is_dir(&self, name: &str) -> HyperspaceResult<Option<bool>> {
        match std::fs::metadata(self.abs_path(name)) {
            Ok(meta) => Ok(Some(meta.is_dir())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HyperspaceError::from_io(e, name)),
        }
    }

    /// Creates a directory entry for `name`.
    pub fn mkdir(&self, name: &str) -> HyperspaceResult<()> {
        debug!(name, "mkdir");
        std::fs::DirBuilder::new()
            .mode(0o755)
            .create(self.abs_path(name))
            .map_err(|e| HyperspaceError::from_io(e, name))
    }

    /// Removes the entry for `name`: rmdir for directories, unlink for
    /// files.
    pub fn delete(&self, name: &str) -> HyperspaceResult<()> {
        debug!(name, "delete");
        let abs = self.abs_path(name);
        let meta = std::fs::metadata(&abs).map_err(|e| HyperspaceError::from_io(e, name))?;
        let result = if meta.is_dir() {
            std::fs::remove_dir(&abs)
        } else {
            std::fs::remove_file(&abs)
        };
        result.map_err(|e| HyperspaceError::from_io(e, name))
    }

    /// Unlinks the backing file of an ephemeral node; the open descriptor
    /// keeps the inode alive.
    pub fn unlink(&self, name: &str) -> HyperspaceResult<()> {
        std::fs::remove_file(self.abs_path(name)).map_err(|e| HyperspaceError::from_io(e, name))
    }

    /// Opens the backing inode for a node: read-only for directories,
    /// read-write for files, honoring CREATE and EXCL.
    pub fn open_node(
        &self,
        name: &str,
        flags: OpenFlags,
        is_directory: bool,
    ) -> HyperspaceResult<File> {
        let mut opts = OpenOptions::new();
        if is_directory {
            opts.read(true);
        } else {
            opts.read(true).write(true);
            if flags.contains(OpenFlags::CREATE) {
                opts.create(true);
            }
            if flags.contains(OpenFlags::EXCL) {
                opts.custom_flags(libc::O_EXCL);
            }
            opts.mode(0o644);
        }
        opts.open(self.abs_path(name))
            .map_err(|e| HyperspaceError::from_io(e, name))
    }

    /// Reads an extended attribute from an open descriptor. `Ok(None)` when
    /// the attribute does not exist.
    pub fn get_xattr(file: &File, name: &str) -> HyperspaceResult<Option<Vec<u8>>> {
        let cname = xattr_name(name)?;
        let fd = file.as_raw_fd();
        loop {
            let size =
                unsafe { libc::fgetxattr(fd, cname.as_ptr(), std::ptr::null_mut(), 0) };
            if size < 0 {
                let err = std::io::Error::last_os_error();
                return if err.raw_os_error() == Some(libc::ENODATA) {
                    Ok(None)
                } else {
                    Err(HyperspaceError::from_io(err, name))
                };
            }

            let mut value = vec![0u8; size as usize];
            let read = unsafe {
                libc::fgetxattr(
                    fd,
                    cname.as_ptr(),
                    value.as_mut_ptr() as *mut libc::c_void,
                    value.len(),
                )
            };
            if read < 0 {
                let err = std::io::Error::last_os_error();
                match err.raw_os_error() {
                    // Grew between the size query and the read; retry.
                    Some(libc::ERANGE) => continue,
                    Some(libc::ENODATA) => return Ok(None),
                    _ => return Err(HyperspaceError::from_io(err, name)),
                }
            }
            value.truncate(read as usize);
            return Ok(Some(value));
        }
    }

    /// Writes an extended attribute on an open descriptor, creating or
    /// replacing it.
    pub fn set_xattr(file: &File, name: &str, value: &[u8]) -> HyperspaceResult<()> {
        let cname = xattr_name(name)?;
        let rc = unsafe {
            libc::fsetxattr(
                file.as_raw_fd(),
                cname.as_ptr(),
                value.as_ptr() as *const libc::c_void,
                value.len(),
                0,
            )
        };
        if rc != 0 {
            return Err(HyperspaceError::from_io(
                std::io::Error::last_os_error(),
                name,
            ));
        }
        Ok(())
    }

    /// Removes an extended attribute; `AttrNotFound` if absent.
    pub fn remove_xattr(file: &File, name: &str) -> HyperspaceResult<()> {
        let cname = xattr_name(name)?;
        let rc = unsafe { libc::fremovexattr(file.as_raw_fd(), cname.as_ptr()) };
        if rc != 0 {
            return Err(HyperspaceError::from_io(
                std::io::Error::last_os_error(),
                name,
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for NamespaceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceStore")
            .field("base_dir", &self.base_dir)
            .field("generation", &self.generation)
            .finish()
    }
}

fn xattr_name(name: &str) -> HyperspaceResult<CString> {
    if name.is_empty() {
        return Err(HyperspaceError::BadPathname(name.to_string()));
    }
    CString::new(format!("user.{name}"))
        .map_err(|_| HyperspaceError::BadPathname(name.to_string()))
}
