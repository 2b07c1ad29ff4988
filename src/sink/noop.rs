use anyhow::Result;

use super::Sink;

/// Dry-run sink: counts what it is given, persists nothing.
#[derive(Debug, Default)]
pub struct NoopSink {
    puts: u64,
    closed: bool,
}

impl NoopSink {
    pub fn puts(&self) -> u64 {
        self.puts
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Sink for NoopSink {
    fn put(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
        self.puts += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "dry-run"
    }
}
