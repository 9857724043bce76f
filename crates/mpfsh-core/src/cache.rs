//! Listing cache decorator
//!
//! Wraps any [`Explorer`] and memoizes directory listings per remote path.
//! Mutating operations invalidate the parent directory of the touched name;
//! `invalidate_cache` drops everything (used after a REPL passthrough,
//! where arbitrary code may have changed the filesystem).

use std::collections::HashMap;
use std::path::Path;

use log::debug;

use crate::channel::Channel;
use crate::error::Result;
use crate::explorer::{posix_join, posix_parent, DirEntry, Explorer};

/// Caching wrapper over a file explorer
pub struct CachingExplorer<E> {
    inner: E,
    cache: HashMap<String, Vec<DirEntry>>,
}

impl<E: Explorer> CachingExplorer<E> {
    pub fn new(inner: E) -> Self {
        CachingExplorer {
            inner,
            cache: HashMap::new(),
        }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    /// Drop the cache entry for the directory containing `name`
    fn invalidate_parent(&mut self, name: &str) {
        let fqn = posix_join(&self.inner.pwd(), name);
        let parent = posix_parent(&fqn);
        if self.cache.remove(&parent).is_some() {
            debug!("cache invalidated for {}", parent);
        }
    }
}

impl<E: Explorer> Explorer for CachingExplorer<E> {
    fn ls(&mut self, include_files: bool, include_dirs: bool) -> Result<Vec<DirEntry>> {
        let dir = self.inner.pwd();
        if !self.cache.contains_key(&dir) {
            let all = self.inner.ls(true, true)?;
            self.cache.insert(dir.clone(), all);
        } else {
            debug!("cache hit for {}", dir);
        }
        Ok(self.cache[&dir]
            .iter()
            .filter(|e| (e.is_dir() && include_dirs) || (!e.is_dir() && include_files))
            .cloned()
            .collect())
    }

    fn cd(&mut self, target: &str) -> Result<()> {
        self.inner.cd(target)
    }

    fn pwd(&self) -> String {
        self.inner.pwd()
    }

    fn md(&mut self, target: &str) -> Result<()> {
        self.inner.md(target)?;
        self.invalidate_parent(target);
        Ok(())
    }

    fn rm(&mut self, target: &str) -> Result<()> {
        self.inner.rm(target)?;
        self.invalidate_parent(target);
        Ok(())
    }

    fn put(&mut self, src: &Path, dst: &str) -> Result<()> {
        self.inner.put(src, dst)?;
        self.invalidate_parent(dst);
        Ok(())
    }

    fn get(&mut self, src: &str, dst: &Path) -> Result<()> {
        self.inner.get(src, dst)
    }

    fn gets(&mut self, src: &str) -> Result<String> {
        self.inner.gets(src)
    }

    fn puts(&mut self, dst: &str, text: &str) -> Result<()> {
        self.inner.puts(dst, text)?;
        self.invalidate_parent(dst);
        Ok(())
    }

    fn exec_stream(&mut self, code: &str, consumer: &mut dyn FnMut(&[u8])) -> Result<()> {
        self.inner.exec_stream(code, consumer)
    }

    fn sysname(&self) -> String {
        self.inner.sysname()
    }

    fn setup(&mut self) -> Result<()> {
        self.inner.setup()
    }

    fn teardown(&mut self) -> Result<()> {
        self.inner.teardown()
    }

    fn close(&mut self) {
        self.inner.close()
    }

    fn channel_mut(&mut self) -> &mut dyn Channel {
        self.inner.channel_mut()
    }

    fn invalidate_cache(&mut self) {
        self.cache.clear();
    }
}
