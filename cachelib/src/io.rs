use std::fs::File;
use std::io::BufRead;

/// Wraps a trace file in a reader suited to one sequential pass
pub fn get_reader(file: File) -> std::io::Result<impl BufRead> {
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::BufReader;
        // Trace records are 40 bytes, 4096 is the standard block size (or a multiple of it) on most systems
        const BUFFER_SIZE: usize = 40 * 4096;
        Ok(BufReader::with_capacity(BUFFER_SIZE, file))
    }
    // Memory map the file for speed on unix systems
    #[cfg(unix)]
    {
        use std::io::Cursor;
        use memmap2::{Advice, Mmap};
        // The trace is only ever read front to back, and nothing else writes to it during a run
        let map = unsafe { Mmap::map(&file)? };
        map.advise(Advice::Sequential)?;
        Ok(Cursor::new(map))
    }
}
