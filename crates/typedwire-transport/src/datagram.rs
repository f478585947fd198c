use std::io::ErrorKind;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Channel;

/// Unix datagram socket channel.
///
/// Datagrams preserve message boundaries, so each `send` maps to exactly one
/// `try_recv` on the peer. The socket runs in non-blocking mode; blocking
/// behavior is layered on top by polling. A send to a peer whose buffer is
/// full fails with [`TransportError::WouldBlock`].
pub struct DatagramChannel {
    socket: UnixDatagram,
    path: Option<PathBuf>,
    created_inode: Option<(u64, u64)>,
    max_message_size: usize,
    stash: Option<Bytes>,
}

impl DatagramChannel {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind the receiving end of a channel at `path`.
    ///
    /// A stale socket file at `path` is removed first; any other kind of file
    /// is left alone and reported as a bind error.
    pub fn bind(path: impl AsRef<Path>, max_message_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        check_path_len(&path, Self::MAX_PATH_LEN)?;

        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
            if !metadata.file_type().is_socket() {
                return Err(TransportError::Bind {
                    path,
                    source: std::io::Error::new(
                        ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
        }

        let socket = UnixDatagram::bind(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;
        socket.set_nonblocking(true)?;
        let created = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        info!(?path, max_message_size, "bound datagram channel");

        Ok(Self {
            socket,
            created_inode: Some((created.dev(), created.ino())),
            path: Some(path),
            max_message_size,
            stash: None,
        })
    }

    /// Connect the sending end of a channel to a bound `path`.
    pub fn connect(path: impl AsRef<Path>, max_message_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let socket = UnixDatagram::unbound()?;
        socket.connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        socket.set_nonblocking(true)?;
        debug!(?path, "connected datagram channel");
        Ok(Self {
            socket,
            path: None,
            created_inode: None,
            max_message_size,
            stash: None,
        })
    }

    /// Create a connected pair of channels.
    pub fn pair(max_message_size: usize) -> Result<(Self, Self)> {
        let (left, right) = UnixDatagram::pair()?;
        left.set_nonblocking(true)?;
        right.set_nonblocking(true)?;
        let wrap = |socket| Self {
            socket,
            path: None,
            created_inode: None,
            max_message_size,
            stash: None,
        };
        Ok((wrap(left), wrap(right)))
    }

    /// The path this channel is bound to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn recv_now(&mut self) -> Result<Option<Bytes>> {
        let mut buf = vec![0u8; self.max_message_size + 1];
        match self.socket.recv(&mut buf) {
            Ok(n) if n > self.max_message_size => Err(TransportError::MessageTooLarge {
                size: n,
                max: self.max_message_size,
            }),
            Ok(n) => {
                buf.truncate(n);
                Ok(Some(Bytes::from(buf)))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(TransportError::Io(err)),
        }
    }
}

impl Channel for DatagramChannel {
    fn send(&mut self, msg: &[u8]) -> Result<()> {
        if msg.len() > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: msg.len(),
                max: self.max_message_size,
            });
        }
        loop {
            match self.socket.send(msg) {
                Ok(_) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    debug!(size = msg.len(), "peer buffer full");
                    return Err(TransportError::WouldBlock(self.name().to_string()));
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn try_recv(&mut self) -> Result<Option<Bytes>> {
        if let Some(msg) = self.stash.take() {
            return Ok(Some(msg));
        }
        self.recv_now()
    }

    fn pending(&mut self) -> Result<usize> {
        if self.stash.is_none() {
            self.stash = self.recv_now()?;
        }
        Ok(usize::from(self.stash.is_some()))
    }

    fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    fn name(&self) -> &str {
        "unix-datagram"
    }
}

impl Drop for DatagramChannel {
    fn drop(&mut self) {
        let (Some(path), Some((dev, ino))) = (&self.path, self.created_inode) else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(path) {
            if metadata.file_type().is_socket() && metadata.dev() == dev && metadata.ino() == ino
            {
                debug!(?path, "cleaning up socket file");
                let _ = std::fs::remove_file(path);
            } else {
                debug!(?path, "socket path identity changed; skipping cleanup");
            }
        }
    }
}

impl std::fmt::Debug for DatagramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramChannel")
            .field("path", &self.path)
            .field("max_message_size", &self.max_message_size)
            .finish()
    }
}

fn check_path_len(path: &Path, max: usize) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= max {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("twdg-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn pair_preserves_message_boundaries() {
        let (mut a, mut b) = DatagramChannel::pair(1024).unwrap();
        a.send(b"first").unwrap();
        a.send(b"second").unwrap();

        assert_eq!(b.pending().unwrap(), 1);
        assert_eq!(b.try_recv().unwrap().unwrap().as_ref(), b"first");
        assert_eq!(b.try_recv().unwrap().unwrap().as_ref(), b"second");
        assert!(b.try_recv().unwrap().is_none());
        assert_eq!(b.pending().unwrap(), 0);
    }

    #[test]
    fn oversized_send_rejected() {
        let (mut a, _b) = DatagramChannel::pair(4).unwrap();
        assert!(matches!(
            a.send(b"too long"),
            Err(TransportError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn full_peer_buffer_fails_send() {
        let (mut a, mut b) = DatagramChannel::pair(1024).unwrap();
        let chunk = [7u8; 1024];

        let mut sent = 0usize;
        let err = loop {
            match a.send(&chunk) {
                Ok(()) => sent += 1,
                Err(err) => break err,
            }
            assert!(sent < 1_000_000, "send never reported a full buffer");
        };
        assert!(matches!(err, TransportError::WouldBlock(ref name) if name == "unix-datagram"));
        assert!(sent > 0);

        assert_eq!(b.try_recv().unwrap().unwrap().len(), 1024);
    }

    #[test]
    fn bind_connect_and_cleanup() {
        let dir = temp_dir("bind");
        let sock_path = dir.join("in.sock");

        let mut rx = DatagramChannel::bind(&sock_path, 256).unwrap();
        let mut tx = DatagramChannel::connect(&sock_path, 256).unwrap();
        assert!(sock_path.exists());
        assert_eq!(rx.path(), Some(sock_path.as_path()));

        tx.send(b"over the wire").unwrap();
        assert_eq!(rx.try_recv().unwrap().unwrap().as_ref(), b"over the wire");

        drop(rx);
        assert!(!sock_path.exists(), "socket file should be removed on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bind_rejects_existing_regular_file() {
        let dir = temp_dir("file");
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular").unwrap();

        assert!(matches!(
            DatagramChannel::bind(&sock_path, 256),
            Err(TransportError::Bind { .. })
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        assert!(matches!(
            DatagramChannel::bind(long_path, 256),
            Err(TransportError::PathTooLong { .. })
        ));
    }
}
