// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! JSON Lines record sink with periodic checkpoints.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::debug;

use crate::error::{self, Result};

/// Appends one JSON object per line and flushes every `checkpoint_every`
/// records, so an interrupted run keeps everything up to the last
/// checkpoint.
#[derive(Debug,)]
pub struct RecordWriter<W: Write = BufWriter<File,>,>
{
    sink:             W,
    path:             PathBuf,
    checkpoint_every: usize,
    written:          usize,
    since_flush:      usize,
}

impl RecordWriter
{
    /// Creates (or truncates) `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) when the file cannot be created.
    pub fn create(path: &Path, checkpoint_every: usize,) -> Result<Self,>
    {
        if let Some(parent,) = path.parent().filter(|p| !p.as_os_str().is_empty(),) {
            fs::create_dir_all(parent,).map_err(|source| error::io_error(parent, source,),)?;
        }
        let file = File::create(path,).map_err(|source| error::io_error(path, source,),)?;
        Ok(Self::from_writer(BufWriter::new(file,), path, checkpoint_every,),)
    }
}

impl<W: Write,> RecordWriter<W,>
{
    /// Wraps an arbitrary writer; `label` names it in I/O errors.
    pub fn from_writer(sink: W, label: &Path, checkpoint_every: usize,) -> Self
    {
        Self {
            sink,
            path: label.to_path_buf(),
            checkpoint_every: checkpoint_every.max(1,),
            written: 0,
            since_flush: 0,
        }
    }

    /// Appends `record` as one line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialize`](crate::Error::Serialize) or
    /// [`Error::Io`](crate::Error::Io).
    pub fn write<T: Serialize,>(&mut self, record: &T,) -> Result<(),>
    {
        serde_json::to_writer(&mut self.sink, record,)?;
        writeln!(self.sink).map_err(|source| error::io_error(&self.path, source,),)?;
        self.written += 1;
        self.since_flush += 1;

        if self.since_flush >= self.checkpoint_every {
            self.flush()?;
            debug!("checkpoint: {} records in {}", self.written, self.path.display());
        }
        Ok((),)
    }

    /// Appends every record of `records`.
    ///
    /// # Errors
    ///
    /// Stops at the first failing write.
    pub fn write_all<T: Serialize,>(&mut self, records: &[T],) -> Result<(),>
    {
        records.iter().try_for_each(|record| self.write(record,),)
    }

    /// Flushes buffered records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) when flushing fails.
    pub fn flush(&mut self,) -> Result<(),>
    {
        self.sink.flush().map_err(|source| error::io_error(&self.path, source,),)?;
        self.since_flush = 0;
        Ok((),)
    }

    /// Records written so far.
    pub fn written(&self,) -> usize
    {
        self.written
    }

    pub fn path(&self,) -> &Path
    {
        &self.path
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) when the final flush fails.
    pub fn finish(mut self,) -> Result<W,>
    {
        self.flush()?;
        Ok(self.sink,)
    }
}

#[cfg(test)]
mod tests
{
    use serde_json::{Value, json};

    use super::*;

    #[derive(Default,)]
    struct CountingSink
    {
        bytes:   Vec<u8,>,
        flushes: usize,
    }

    impl Write for CountingSink
    {
        fn write(&mut self, buf: &[u8],) -> std::io::Result<usize,>
        {
            self.bytes.extend_from_slice(buf,);
            Ok(buf.len(),)
        }

        fn flush(&mut self,) -> std::io::Result<(),>
        {
            self.flushes += 1;
            Ok((),)
        }
    }

    #[test]
    fn writes_one_object_per_line()
    {
        let dir = tempfile::tempdir().expect("temp dir",);
        let path = dir.path().join("nested/out.jsonl",);
        let mut writer = RecordWriter::create(&path, 1000,).expect("created",);

        writer.write_all(&[json!({"a": 1}), json!({"b": "two"})],).expect("written",);
        assert_eq!(writer.written(), 2);
        writer.finish().expect("flushed",);

        let contents = fs::read_to_string(&path,).expect("readable",);
        let lines: Vec<Value,> =
            contents.lines().map(|line| serde_json::from_str(line,).expect("json line",),).collect();
        assert_eq!(lines, vec![json!({"a": 1}), json!({"b": "two"})]);
    }

    #[test]
    fn flushes_at_every_checkpoint()
    {
        let mut writer = RecordWriter::from_writer(CountingSink::default(), Path::new("memory",), 3,);
        for index in 0..7 {
            writer.write(&json!({ "index": index }),).expect("written",);
        }
        assert_eq!(writer.sink.flushes, 2);

        let sink = writer.finish().expect("flushed",);
        assert_eq!(sink.flushes, 3);
        assert_eq!(String::from_utf8(sink.bytes,).expect("utf8",).lines().count(), 7);
    }

    #[test]
    fn unwritable_path_is_io_error()
    {
        let dir = tempfile::tempdir().expect("temp dir",);
        let blocker = dir.path().join("file",);
        fs::write(&blocker, "",).expect("blocker",);

        let error = RecordWriter::create(&blocker.join("out.jsonl",), 10,).expect_err("not a dir",);
        assert!(matches!(error, crate::Error::Io { .. }));
    }
}
