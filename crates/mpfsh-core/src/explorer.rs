//! Remote file explorer
//!
//! A thin command layer over the raw-REPL driver: every operation is a
//! generated MicroPython snippet executed on the device, with the printed
//! result parsed locally. The generated source is a compatibility contract
//! with the MicroPython runtime and must stay valid for it.

use std::path::Path;

use log::debug;

use crate::board::Board;
use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::literal::{hexlify, parse_ilistdir, py_str_escape, unhexlify, MODE_DIR};
use crate::retry::RetryPolicy;

/// Transfer chunk size for the hex-encoded file payloads
pub const BIN_CHUNK_SIZE: usize = 64;

/// Kind of a remote directory entry; directories order before files
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    Dir,
    File,
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Interface of the file explorer.
///
/// `FileExplorer` implements it against a live board; `CachingExplorer`
/// decorates any implementation with a listing cache. The batch operations
/// are provided methods so a decorator's `put`/`get`/`rm` overrides apply
/// to them automatically.
pub trait Explorer {
    /// List the current remote directory, directories first, then sorted
    /// by name
    fn ls(&mut self, include_files: bool, include_dirs: bool) -> Result<Vec<DirEntry>>;

    /// Change the remote working directory (`..` and absolute paths work)
    fn cd(&mut self, target: &str) -> Result<()>;

    /// Current remote working directory
    fn pwd(&self) -> String;

    /// Create a remote directory
    fn md(&mut self, target: &str) -> Result<()>;

    /// Remove a remote file, or an empty remote directory
    fn rm(&mut self, target: &str) -> Result<()>;

    /// Upload a local file
    fn put(&mut self, src: &Path, dst: &str) -> Result<()>;

    /// Download a remote file
    fn get(&mut self, src: &str, dst: &Path) -> Result<()>;

    /// Read a remote file as text (binary content is hex-dumped)
    fn gets(&mut self, src: &str) -> Result<String>;

    /// Write a string to a remote file
    fn puts(&mut self, dst: &str, text: &str) -> Result<()>;

    /// Execute a snippet on the device, streaming its output live
    fn exec_stream(&mut self, code: &str, consumer: &mut dyn FnMut(&[u8])) -> Result<()>;

    /// Device system name (`uos.uname()[0]`), known after `setup`
    fn sysname(&self) -> String;

    /// Enter raw REPL and (re-)establish the session: import shims,
    /// working directory, sysname
    fn setup(&mut self) -> Result<()>;

    /// Leave raw REPL, releasing the channel for terminal use
    fn teardown(&mut self) -> Result<()>;

    /// Exit raw REPL (best effort) and close the channel
    fn close(&mut self);

    /// Underlying byte channel, for the terminal passthrough
    fn channel_mut(&mut self) -> &mut dyn Channel;

    /// Drop any cached listings; a no-op unless a cache is layered on
    fn invalidate_cache(&mut self) {}

    /// Download every remote file matching `pat` into `dst_dir`.
    ///
    /// Not recursive: directories are skipped, not descended into.
    fn mget(
        &mut self,
        dst_dir: &Path,
        pat: &str,
        on_file: &mut dyn FnMut(&str),
    ) -> Result<usize> {
        let pattern = compile_pattern(pat)?;
        let names: Vec<String> = self.ls(true, false)?.into_iter().map(|e| e.name).collect();
        let mut count = 0;
        for name in names {
            if pattern.matches(&name) {
                on_file(&name);
                self.get(&name, &dst_dir.join(&name))?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Upload every local file in `src_dir` matching `pat`, keeping names.
    ///
    /// Not recursive: directories are skipped, not descended into.
    fn mput(
        &mut self,
        src_dir: &Path,
        pat: &str,
        on_file: &mut dyn FnMut(&str),
    ) -> Result<usize> {
        let pattern = compile_pattern(pat)?;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(src_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if pattern.matches(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        for name in &names {
            on_file(name);
            self.put(&src_dir.join(name), name)?;
        }
        Ok(names.len())
    }

    /// Remove every remote file matching `pat` (never directories)
    fn mrm(&mut self, pat: &str, on_file: &mut dyn FnMut(&str)) -> Result<usize> {
        let pattern = compile_pattern(pat)?;
        let names: Vec<String> = self.ls(true, false)?.into_iter().map(|e| e.name).collect();
        let mut count = 0;
        for name in names {
            if pattern.matches(&name) {
                on_file(&name);
                self.rm(&name)?;
                count += 1;
            }
        }
        Ok(count)
    }
}

fn compile_pattern(pat: &str) -> Result<glob::Pattern> {
    glob::Pattern::new(pat)
        .map_err(|e| Error::RemoteIo(format!("Invalid selection pattern '{}': {}", pat, e)))
}

/// Explorer over a live raw-REPL session
pub struct FileExplorer<C> {
    board: Board<C>,
    cwd: String,
    sysname: String,
    retry: RetryPolicy,
}

/// Device-side error classes recognized in remote tracebacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemoteErrno {
    /// ENOENT / ENODEV / EINVAL: the name does not exist
    Missing,
    /// EEXIST: the name is already taken
    Exists,
    /// EACCES / ENOTEMPTY / EISDIR: a directory is in the way
    Blocked,
    Other,
}

fn classify(err: &Error) -> RemoteErrno {
    let Error::RemoteException { error, .. } = err else {
        return RemoteErrno::Other;
    };
    let text = String::from_utf8_lossy(error);
    if ["ENOENT", "ENODEV", "EINVAL"].iter().any(|e| text.contains(e)) {
        RemoteErrno::Missing
    } else if text.contains("EEXIST") {
        RemoteErrno::Exists
    } else if ["EACCES", "ENOTEMPTY", "EISDIR"].iter().any(|e| text.contains(e)) {
        RemoteErrno::Blocked
    } else {
        RemoteErrno::Other
    }
}

impl<C: Channel> FileExplorer<C> {
    pub fn new(board: Board<C>) -> Self {
        Self::with_retry(board, RetryPolicy::default())
    }

    pub fn with_retry(board: Board<C>, retry: RetryPolicy) -> Self {
        FileExplorer {
            board,
            cwd: "/".to_string(),
            sysname: String::new(),
            retry,
        }
    }

    /// Access to the protocol driver (raw exec, timeouts, raw-paste toggle)
    pub fn board_mut(&mut self) -> &mut Board<C> {
        &mut self.board
    }

    /// Fully qualified name of `name` against the working directory
    fn fqn(&self, name: &str) -> String {
        posix_join(&self.cwd, name)
    }

    /// Whether the board is a WiPy, which has its own quirks
    fn is_wipy(&self) -> bool {
        self.sysname == "WiPy"
    }

    fn listing(&mut self, dir: &str) -> Result<Vec<DirEntry>> {
        let res = self
            .board
            .eval(&format!("list(uos.ilistdir('{}'))", py_str_escape(dir)));
        let raw = match res {
            Ok(raw) => raw,
            Err(e) if classify(&e) == RemoteErrno::Missing => {
                return Err(Error::RemoteIo(format!("No such directory: {}", dir)));
            }
            Err(e) => return Err(e),
        };
        let text = String::from_utf8_lossy(&raw).into_owned();
        let entries = parse_ilistdir(&text)
            .map_err(|e| Error::Protocol(format!("bad directory listing: {}", e)))?;

        // On a WiPy everything in the root is a mount point
        if self.is_wipy() && dir == "/" {
            return Ok(entries
                .into_iter()
                .map(|(name, _)| DirEntry {
                    name,
                    kind: EntryKind::Dir,
                })
                .collect());
        }

        Ok(entries
            .into_iter()
            .map(|(name, mode)| DirEntry {
                name,
                kind: if mode & MODE_DIR != 0 {
                    EntryKind::Dir
                } else {
                    EntryKind::File
                },
            })
            .collect())
    }

    /// Open a remote file for writing and stream `data` in hex chunks
    fn write_remote(&mut self, dst: &str, data: &[u8]) -> Result<()> {
        let dest = py_str_escape(&self.fqn(dst));

        self.board
            .exec(&format!("f = open('{}', 'wb')", dest))
            .map_err(|e| match classify(&e) {
                RemoteErrno::Missing => {
                    Error::RemoteIo(format!("Failed to create file: {}", dst))
                }
                RemoteErrno::Blocked => Error::RemoteIo(format!("Existing directory: {}", dst)),
                _ => e,
            })?;

        for chunk in data.chunks(BIN_CHUNK_SIZE) {
            self.board
                .exec(&format!("f.write(ubinascii.unhexlify('{}'))", hexlify(chunk)))?;
        }

        self.board.exec("f.close()")?;
        Ok(())
    }

    /// Read a remote file through the chunked hexlify loop
    fn read_remote(&mut self, src: &str) -> Result<Vec<u8>> {
        let source = py_str_escape(&self.fqn(src));

        self.board
            .exec(&format!("f = open('{}', 'rb')", source))
            .map_err(|e| match classify(&e) {
                RemoteErrno::Missing => Error::RemoteIo(format!("Failed to read file: {}", src)),
                _ => e,
            })?;

        let ret = self.board.exec(&format!(
            "while True:\r\n  c = ubinascii.hexlify(f.read({}))\r\n  if not len(c):\r\n    break\r\n  sys.stdout.write(c)\r\n",
            BIN_CHUNK_SIZE
        ))?;

        self.board.exec("f.close()")?;

        let text = String::from_utf8_lossy(&ret).into_owned();
        unhexlify(text.trim())
            .map_err(|e| Error::Protocol(format!("could not decode file data: {}", e)))
    }
}

impl<C: Channel> Explorer for FileExplorer<C> {
    fn ls(&mut self, include_files: bool, include_dirs: bool) -> Result<Vec<DirEntry>> {
        let cwd = self.cwd.clone();
        let mut entries: Vec<DirEntry> = self
            .listing(&cwd)?
            .into_iter()
            .filter(|e| {
                (e.is_dir() && include_dirs) || (!e.is_dir() && include_files)
            })
            .collect();
        // Directories first, then alphabetical
        entries.sort_by(|a, b| (a.kind, a.name.as_str()).cmp(&(b.kind, b.name.as_str())));
        Ok(entries)
    }

    fn cd(&mut self, target: &str) -> Result<()> {
        let new_dir = if target.starts_with('/') {
            target.to_string()
        } else if target == "." {
            self.cwd.clone()
        } else if target == ".." {
            posix_parent(&self.cwd)
        } else {
            self.fqn(target)
        };

        // Verify the directory exists by listing it
        let res = self
            .board
            .eval(&format!("uos.listdir('{}')", py_str_escape(&new_dir)));
        match res {
            Ok(_) => {
                self.cwd = new_dir;
                Ok(())
            }
            Err(e) if classify(&e) == RemoteErrno::Missing => {
                Err(Error::RemoteIo(format!("No such directory: {}", target)))
            }
            Err(e) => Err(e),
        }
    }

    fn pwd(&self) -> String {
        self.cwd.clone()
    }

    fn md(&mut self, target: &str) -> Result<()> {
        let path = py_str_escape(&self.fqn(target));
        debug!("mkdir {}", path);
        match self.board.eval(&format!("uos.mkdir('{}')", path)) {
            Ok(_) => Ok(()),
            Err(e) => match classify(&e) {
                RemoteErrno::Missing => {
                    Err(Error::RemoteIo(format!("Invalid directory name: {}", target)))
                }
                RemoteErrno::Exists => Err(Error::RemoteIo(format!(
                    "File or directory exists: {}",
                    target
                ))),
                _ => Err(e),
            },
        }
    }

    fn rm(&mut self, target: &str) -> Result<()> {
        let path = py_str_escape(&self.fqn(target));
        debug!("rm {}", path);

        // First try it as a file, then as an (empty) directory
        if self.board.eval(&format!("uos.remove('{}')", path)).is_ok() {
            return Ok(());
        }
        match self.board.eval(&format!("uos.rmdir('{}')", path)) {
            Ok(_) => Ok(()),
            Err(e) => match classify(&e) {
                RemoteErrno::Missing => {
                    if self.is_wipy() {
                        Err(Error::RemoteIo(format!(
                            "No such file or directory or directory not empty: {}",
                            target
                        )))
                    } else {
                        Err(Error::RemoteIo(format!(
                            "No such file or directory: {}",
                            target
                        )))
                    }
                }
                RemoteErrno::Blocked => {
                    Err(Error::RemoteIo(format!("Directory not empty: {}", target)))
                }
                _ => Err(e),
            },
        }
    }

    fn put(&mut self, src: &Path, dst: &str) -> Result<()> {
        debug!("put {} -> {}", src.display(), dst);
        let data = std::fs::read(src)?;
        // Retry resends the whole file; there is no resume-from-offset
        let retry = self.retry;
        retry.run(|| self.write_remote(dst, &data))
    }

    fn get(&mut self, src: &str, dst: &Path) -> Result<()> {
        debug!("get {} -> {}", src, dst.display());
        let retry = self.retry;
        let data = retry.run(|| {
            let known = self.ls(true, true)?;
            if !known.iter().any(|e| e.name == src) {
                return Err(Error::RemoteIo(format!(
                    "No such file or directory: '{}'",
                    self.fqn(src)
                )));
            }
            self.read_remote(src)
        })?;
        std::fs::write(dst, data)?;
        Ok(())
    }

    fn gets(&mut self, src: &str) -> Result<String> {
        let retry = self.retry;
        let data = retry.run(|| self.read_remote(src))?;
        match String::from_utf8(data) {
            Ok(text) => Ok(text),
            Err(e) => {
                // Not text: render a hex dump instead
                let hex = hexlify(e.as_bytes());
                let mut out = String::from("\nBinary file:\n\n");
                for line in hex.as_bytes().chunks(64) {
                    out.push_str(std::str::from_utf8(line).unwrap());
                    out.push('\n');
                }
                Ok(out)
            }
        }
    }

    fn puts(&mut self, dst: &str, text: &str) -> Result<()> {
        let data = text.as_bytes().to_vec();
        let retry = self.retry;
        retry.run(|| self.write_remote(dst, &data))
    }

    fn exec_stream(&mut self, code: &str, consumer: &mut dyn FnMut(&[u8])) -> Result<()> {
        self.board.exec_raw_no_follow(code.as_bytes())?;
        let (output, error) = self.board.follow(None, Some(consumer))?;
        if !error.is_empty() {
            return Err(Error::RemoteException { output, error });
        }
        Ok(())
    }

    fn sysname(&self) -> String {
        self.sysname.clone()
    }

    fn setup(&mut self) -> Result<()> {
        self.board.enter_raw_repl()?;
        self.board.exec(
            "try:\n    import uos\nexcept ImportError:\n    import os as uos\nimport sys",
        )?;
        self.board.exec(
            "try:\n    import ubinascii\nexcept ImportError:\n    import binascii as ubinascii",
        )?;

        // Newer firmware mounts the filesystem under /flash; root the cached
        // working directory wherever the device says it is.
        let cwd = self.board.eval("uos.getcwd()")?;
        let cwd = String::from_utf8_lossy(&cwd).into_owned();
        self.cwd = posix_join("/", &cwd);

        let sysname = self.board.eval("uos.uname()[0]")?;
        self.sysname = String::from_utf8_lossy(&sysname).into_owned();
        debug!("connected to {} (cwd {})", self.sysname, self.cwd);
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        self.board.exit_raw_repl()
    }

    fn close(&mut self) {
        let _ = self.board.exit_raw_repl();
        self.board.close();
    }

    fn channel_mut(&mut self) -> &mut dyn Channel {
        self.board.channel_mut()
    }
}

/// Join `name` onto `base` with POSIX semantics (absolute names win)
pub fn posix_join(base: &str, name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else if name.is_empty() {
        base.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Parent of a POSIX path; the root is its own parent
pub fn posix_parent(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

/// Compile a local Python file with the `mpy-cross` cross compiler.
///
/// Without `dst` the output lands next to the source with an `.mpy`
/// extension, as the compiler does by default.
pub fn mpy_cross(src: &Path, dst: Option<&Path>) -> Result<()> {
    let mut cmd = std::process::Command::new("mpy-cross");
    if let Some(dst) = dst {
        cmd.arg("-o").arg(dst);
    }
    cmd.arg(src);
    debug!("running {:?}", cmd);
    let status = cmd.status()?;
    if !status.success() {
        return Err(Error::Io(std::io::Error::other(format!(
            "failed to compile: {}",
            src.display()
        ))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeDevice;

    fn explorer(raw_paste: bool) -> FileExplorer<FakeDevice> {
        let board = Board::new(FakeDevice::new(raw_paste));
        let mut fe = FileExplorer::new(board);
        fe.setup().unwrap();
        fe
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            tries: 1,
            delay: std::time::Duration::from_millis(1),
            backoff: 1,
        }
    }

    /// Deterministic pseudo-random payload of the given size
    fn payload(size: usize) -> Vec<u8> {
        let mut state: u32 = 0x2545_f491;
        (0..size)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            })
            .collect()
    }

    fn round_trip(raw_paste: bool) {
        let dir = tempfile::tempdir().unwrap();
        let mut fe = explorer(raw_paste);
        assert_eq!(fe.board_mut().uses_raw_paste(), raw_paste);

        // Sizes straddling the chunk boundary, plus empty and multi-chunk
        for &size in &[0usize, 1, 63, 64, 65, 1000] {
            let data = payload(size);
            let local = dir.path().join(format!("in_{}.bin", size));
            let back = dir.path().join(format!("out_{}.bin", size));
            std::fs::write(&local, &data).unwrap();

            let remote = format!("data_{}.bin", size);
            fe.put(&local, &remote).unwrap();
            fe.get(&remote, &back).unwrap();
            assert_eq!(std::fs::read(&back).unwrap(), data, "size {}", size);
        }

        // The negotiated mode must not have changed underneath us
        assert_eq!(fe.board_mut().uses_raw_paste(), raw_paste);
    }

    #[test]
    fn put_get_round_trip_classic() {
        round_trip(false);
    }

    #[test]
    fn put_get_round_trip_raw_paste() {
        round_trip(true);
    }

    #[test]
    fn setup_establishes_cwd_and_sysname() {
        let fe = explorer(false);
        assert_eq!(fe.pwd(), "/flash");
        assert_eq!(fe.sysname(), "esp32");
    }

    #[test]
    fn ls_sorts_directories_before_files() {
        let mut fe = explorer(false);
        {
            let dev = fe.board_mut().channel_mut();
            dev.add_file("/flash/a.py", b"x");
            dev.add_dir("/flash/sub");
            dev.add_file("/flash/boot.py", b"y");
        }
        let entries = fe.ls(true, true).unwrap();
        let listed: Vec<(String, EntryKind)> =
            entries.into_iter().map(|e| (e.name, e.kind)).collect();
        assert_eq!(
            listed,
            vec![
                ("sub".to_string(), EntryKind::Dir),
                ("a.py".to_string(), EntryKind::File),
                ("boot.py".to_string(), EntryKind::File),
            ]
        );
    }

    #[test]
    fn ls_filters_by_kind() {
        let mut fe = explorer(false);
        {
            let dev = fe.board_mut().channel_mut();
            dev.add_file("/flash/a.py", b"x");
            dev.add_dir("/flash/sub");
        }
        let files = fe.ls(true, false).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "a.py");
        let dirs = fe.ls(false, true).unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].name, "sub");
    }

    #[test]
    fn wipy_root_entries_are_mount_points() {
        let mut fe = explorer(false);
        {
            let dev = fe.board_mut().channel_mut();
            dev.sysname = "WiPy".to_string();
            dev.add_file("/frozen.py", b"x");
        }
        fe.setup().unwrap();
        fe.cd("/").unwrap();
        let entries = fe.ls(true, true).unwrap();
        assert!(entries.iter().all(|e| e.is_dir()));
    }

    #[test]
    fn cd_resolves_relative_absolute_and_dotdot() {
        let mut fe = explorer(false);
        fe.board_mut().channel_mut().add_dir("/flash/lib");

        fe.cd("lib").unwrap();
        assert_eq!(fe.pwd(), "/flash/lib");
        fe.cd("..").unwrap();
        assert_eq!(fe.pwd(), "/flash");
        fe.cd(".").unwrap();
        assert_eq!(fe.pwd(), "/flash");
        fe.cd("/").unwrap();
        assert_eq!(fe.pwd(), "/");
    }

    #[test]
    fn cd_to_missing_directory_is_remote_io() {
        let mut fe = explorer(false);
        match fe.cd("nowhere").unwrap_err() {
            Error::RemoteIo(msg) => assert_eq!(msg, "No such directory: nowhere"),
            other => panic!("expected RemoteIo, got {:?}", other),
        }
        assert_eq!(fe.pwd(), "/flash");
    }

    #[test]
    fn md_creates_and_reports_duplicates() {
        let mut fe = explorer(false);
        fe.md("logs").unwrap();
        assert!(fe.board_mut().channel_mut().has_dir("/flash/logs"));
        match fe.md("logs").unwrap_err() {
            Error::RemoteIo(msg) => assert_eq!(msg, "File or directory exists: logs"),
            other => panic!("expected RemoteIo, got {:?}", other),
        }
    }

    #[test]
    fn rm_removes_files_and_empty_directories() {
        let mut fe = explorer(false);
        {
            let dev = fe.board_mut().channel_mut();
            dev.add_file("/flash/junk.py", b"x");
            dev.add_dir("/flash/empty");
        }
        fe.rm("junk.py").unwrap();
        fe.rm("empty").unwrap();
        let dev = fe.board_mut().channel_mut();
        assert!(dev.file("/flash/junk.py").is_none());
        assert!(!dev.has_dir("/flash/empty"));
    }

    #[test]
    fn rm_missing_name_is_remote_io_with_the_name() {
        let mut fe = explorer(false);
        match fe.rm("ghost.py").unwrap_err() {
            Error::RemoteIo(msg) => {
                assert!(msg.contains("ghost.py"), "message was: {}", msg);
                assert!(msg.starts_with("No such file or directory"));
            }
            other => panic!("expected RemoteIo, got {:?}", other),
        }
    }

    #[test]
    fn rm_populated_directory_does_not_silently_succeed() {
        let mut fe = explorer(false);
        {
            let dev = fe.board_mut().channel_mut();
            dev.add_dir("/flash/full");
            dev.add_file("/flash/full/keep.py", b"x");
        }
        match fe.rm("full").unwrap_err() {
            Error::RemoteIo(msg) => assert_eq!(msg, "Directory not empty: full"),
            other => panic!("expected RemoteIo, got {:?}", other),
        }
        assert!(fe.board_mut().channel_mut().has_dir("/flash/full"));
    }

    #[test]
    fn get_missing_file_is_remote_io() {
        let dir = tempfile::tempdir().unwrap();
        let board = Board::new(FakeDevice::new(false));
        let mut fe = FileExplorer::with_retry(board, fast_retry());
        fe.setup().unwrap();
        match fe.get("ghost.bin", &dir.path().join("out")).unwrap_err() {
            Error::RemoteIo(msg) => assert!(msg.contains("ghost.bin")),
            other => panic!("expected RemoteIo, got {:?}", other),
        }
    }

    #[test]
    fn puts_and_gets_round_trip_text() {
        let mut fe = explorer(false);
        fe.puts("note.txt", "hello\nboard\n").unwrap();
        assert_eq!(fe.gets("note.txt").unwrap(), "hello\nboard\n");
    }

    #[test]
    fn gets_renders_binary_content_as_hex_dump() {
        let mut fe = explorer(false);
        fe.board_mut()
            .channel_mut()
            .add_file("/flash/blob.bin", &[0xff, 0xfe, 0x00, 0x01]);
        let text = fe.gets("blob.bin").unwrap();
        assert!(text.starts_with("\nBinary file:"));
        assert!(text.contains("fffe0001"));
    }

    #[test]
    fn mget_matches_patterns_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut fe = explorer(false);
        {
            let dev = fe.board_mut().channel_mut();
            dev.add_file("/flash/a.py", b"a");
            dev.add_file("/flash/b.py", b"b");
            dev.add_file("/flash/c.txt", b"c");
            dev.add_dir("/flash/d.py");
        }
        let mut seen = Vec::new();
        let count = fe
            .mget(dir.path(), "*.py", &mut |name| seen.push(name.to_string()))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen, vec!["a.py", "b.py"]);
        assert!(dir.path().join("a.py").exists());
        assert!(!dir.path().join("c.txt").exists());
    }

    #[test]
    fn mput_uploads_matching_local_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.py"), b"x").unwrap();
        std::fs::write(dir.path().join("y.py"), b"y").unwrap();
        std::fs::write(dir.path().join("z.txt"), b"z").unwrap();
        std::fs::create_dir(dir.path().join("sub.py")).unwrap();

        let mut fe = explorer(false);
        let mut seen = Vec::new();
        let count = fe
            .mput(dir.path(), "*.py", &mut |name| seen.push(name.to_string()))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen, vec!["x.py", "y.py"]);
        let dev = fe.board_mut().channel_mut();
        assert_eq!(dev.file("/flash/x.py").unwrap(), b"x");
        assert!(dev.file("/flash/z.txt").is_none());
    }

    #[test]
    fn mrm_only_touches_matching_files() {
        let mut fe = explorer(false);
        {
            let dev = fe.board_mut().channel_mut();
            dev.add_file("/flash/old.log", b"1");
            dev.add_file("/flash/new.log", b"2");
            dev.add_file("/flash/main.py", b"3");
        }
        let count = fe.mrm("*.log", &mut |_| {}).unwrap();
        assert_eq!(count, 2);
        let dev = fe.board_mut().channel_mut();
        assert!(dev.file("/flash/main.py").is_some());
        assert!(dev.file("/flash/old.log").is_none());
    }

    #[test]
    fn posix_path_helpers() {
        assert_eq!(posix_join("/flash", "lib"), "/flash/lib");
        assert_eq!(posix_join("/", "lib"), "/lib");
        assert_eq!(posix_join("/flash", "/abs"), "/abs");
        assert_eq!(posix_join("/", ""), "/");
        assert_eq!(posix_parent("/flash/lib"), "/flash");
        assert_eq!(posix_parent("/flash"), "/");
        assert_eq!(posix_parent("/"), "/");
    }
}
