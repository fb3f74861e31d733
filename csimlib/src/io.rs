use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::Path;
use memmap2::Mmap;

// Traces are read line by line, a few pages at a time is plenty
const BUFFER_SIZE: usize = 16 * 4096;

/// A trace file opened for sequential reading
pub enum TraceSource {
    Mapped(Cursor<Mmap>),
    Buffered(BufReader<File>),
}

impl Read for TraceSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            TraceSource::Mapped(c) => c.read(buf),
            TraceSource::Buffered(r) => r.read(buf),
        }
    }
}

impl BufRead for TraceSource {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            TraceSource::Mapped(c) => c.fill_buf(),
            TraceSource::Buffered(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            TraceSource::Mapped(c) => c.consume(amt),
            TraceSource::Buffered(r) => r.consume(amt),
        }
    }
}

/// Opens a trace file. On unix non-empty files are memory mapped, everything else goes through a
/// buffered reader
pub fn open_trace<P: AsRef<Path>>(path: P) -> io::Result<TraceSource> {
    let file = File::open(path)?;
    #[cfg(unix)]
    {
        if file.metadata()?.len() > 0 {
            use memmap2::Advice;
            // Safety: the map is read only, and the trace is not expected to change while it's
            // being replayed
            let m = unsafe { Mmap::map(&file)? };
            m.advise(Advice::Sequential)?;
            return Ok(TraceSource::Mapped(Cursor::new(m)));
        }
    }
    Ok(TraceSource::Buffered(BufReader::with_capacity(BUFFER_SIZE, file)))
}
